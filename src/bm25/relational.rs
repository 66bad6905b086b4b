//! SQLite FTS5-backed BM25 engine: the current on-disk format.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::runtime::Runtime;

use crate::config::Bm25Config;
use crate::tokenizer::tokenize;

use super::{Bm25Doc, Bm25Error, Bm25Hit, Bm25Index, Bm25Stats};

/// Tokenize then drop tokens shorter than `config.min_token_length` or in
/// `config.stop_words`, on top of the tokenizer's own built-in filtering.
/// Applied identically at index time and query time so the two sides of the
/// index agree on vocabulary.
fn tokenize_with_config(text: &str, config: &Bm25Config) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.len() >= config.min_token_length && !config.stop_words.iter().any(|s| s == t))
        .collect()
}

const SCHEMA: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(id UNINDEXED, tokens);
CREATE TABLE IF NOT EXISTS doc_ids (id TEXT PRIMARY KEY);
";

/// Substrings that show up in sqlite's error text for a damaged database
/// file, distinct from ordinary query errors (constraint violations, etc.).
const CORRUPTION_MARKERS: &[&str] = &["database disk image is malformed", "file is not a database"];

pub struct RelationalBm25 {
    pool: SqlitePool,
    runtime: Runtime,
    config: Bm25Config,
    closed: RwLock<bool>,
}

impl RelationalBm25 {
    /// Open with the default [`Bm25Config`]. See [`Self::open_with_config`].
    pub fn open(path: &Path) -> Result<Self, Bm25Error> {
        Self::open_with_config(path, &Bm25Config::default())
    }

    /// `config.min_token_length`/`config.stop_words` narrow the shared
    /// tokenizer's output. `config.k1`/`config.b` have no effect here —
    /// sqlite's FTS5 `bm25()` ranking function hardcodes those constants and
    /// doesn't accept them as arguments; they only take effect on
    /// [`super::SegmentBm25`].
    pub fn open_with_config(path: &Path, config: &Bm25Config) -> Result<Self, Bm25Error> {
        let runtime = Runtime::new().map_err(|e| Bm25Error::Runtime(e.to_string()))?;

        if path.exists() && !runtime.block_on(integrity_ok(path)) {
            tracing::warn!(path = %path.display(), "bm25 index failed integrity check, rebuilding");
            recover(path)?;
        }

        let pool = match runtime.block_on(connect(path)) {
            Ok(pool) => pool,
            Err(e) if is_corruption(&e) => {
                tracing::warn!(path = %path.display(), error = %e, "bm25 open failed with corruption marker, rebuilding");
                recover(path)?;
                runtime.block_on(connect(path))?
            }
            Err(e) => return Err(e.into()),
        };

        runtime.block_on(async {
            for statement in SCHEMA.split(';') {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                sqlx::query(statement).execute(&pool).await?;
            }
            Ok::<(), sqlx::Error>(())
        })?;

        Ok(RelationalBm25 {
            pool,
            runtime,
            config: config.clone(),
            closed: RwLock::new(false),
        })
    }

    fn check_open(&self) -> Result<(), Bm25Error> {
        if *self.closed.read().unwrap() {
            return Err(Bm25Error::IndexClosed);
        }
        Ok(())
    }
}

async fn connect(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_millis(5000))
        .pragma("cache_size", "-65536")
        .pragma("temp_store", "MEMORY");

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
}

fn is_corruption(e: &sqlx::Error) -> bool {
    let msg = e.to_string();
    CORRUPTION_MARKERS.iter().any(|m| msg.contains(m))
}

async fn integrity_ok(path: &Path) -> bool {
    let options = SqliteConnectOptions::new().filename(path).read_only(true);
    let Ok(pool) = SqlitePoolOptions::new().max_connections(1).connect_with(options).await else {
        return false;
    };

    let integrity: Result<(String,), _> = sqlx::query_as("PRAGMA integrity_check")
        .fetch_one(&pool)
        .await;
    let has_fts_content: Result<(i64,), _> = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'documents_fts_content'",
    )
    .fetch_one(&pool)
    .await;

    pool.close().await;

    matches!(integrity, Ok((ref s,)) if s == "ok")
        && matches!(has_fts_content, Ok((n,)) if n == 1)
}

fn recover(path: &Path) -> Result<(), Bm25Error> {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let sibling: PathBuf = PathBuf::from(format!("{}{}", path.display(), suffix));
        if sibling.exists() {
            std::fs::remove_file(&sibling)?;
        }
    }
    Ok(())
}

impl Bm25Index for RelationalBm25 {
    fn index(&self, docs: &[Bm25Doc]) -> Result<(), Bm25Error> {
        self.check_open()?;
        let docs = docs.to_vec();
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for doc in &docs {
                let tokens = tokenize_with_config(&doc.content, &self.config).join(" ");
                sqlx::query("DELETE FROM documents_fts WHERE id = ?")
                    .bind(&doc.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("INSERT INTO documents_fts (id, tokens) VALUES (?, ?)")
                    .bind(&doc.id)
                    .bind(&tokens)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("INSERT OR IGNORE INTO doc_ids (id) VALUES (?)")
                    .bind(&doc.id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<Bm25Hit>, Bm25Error> {
        self.check_open()?;
        let query_tokens = tokenize_with_config(query, &self.config);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = query_tokens.join(" OR ");

        self.runtime.block_on(async {
            let rows = sqlx::query(
                "SELECT id, tokens, bm25(documents_fts) AS rank
                 FROM documents_fts WHERE documents_fts MATCH ?
                 ORDER BY rank LIMIT ?",
            )
            .bind(&match_expr)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

            let query_set: std::collections::HashSet<&str> =
                query_tokens.iter().map(|s| s.as_str()).collect();

            Ok(rows
                .into_iter()
                .map(|row| {
                    let id: String = row.get("id");
                    let tokens: String = row.get("tokens");
                    let rank: f64 = row.get("rank");
                    let matched_terms: Vec<String> = tokens
                        .split(' ')
                        .filter(|t| query_set.contains(t))
                        .map(|t| t.to_string())
                        .collect::<std::collections::BTreeSet<_>>()
                        .into_iter()
                        .collect();
                    Bm25Hit {
                        id,
                        // sqlite's bm25() is negative-is-better; flip for this crate's convention.
                        score: -rank as f32,
                        matched_terms,
                    }
                })
                .collect())
        })
    }

    fn delete(&self, ids: &[String]) -> Result<(), Bm25Error> {
        self.check_open()?;
        let ids = ids.to_vec();
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for id in &ids {
                sqlx::query("DELETE FROM documents_fts WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM doc_ids WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok(())
        })
    }

    fn all_ids(&self) -> Result<Vec<String>, Bm25Error> {
        self.check_open()?;
        self.runtime.block_on(async {
            let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM doc_ids ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
    }

    fn stats(&self) -> Result<Bm25Stats, Bm25Error> {
        self.check_open()?;
        self.runtime.block_on(async {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doc_ids")
                .fetch_one(&self.pool)
                .await?;
            Ok(Bm25Stats {
                document_count: count as u64,
            })
        })
    }

    /// Idempotent: calling `close` again is a no-op, not an error.
    fn close(&self) -> Result<(), Bm25Error> {
        let mut closed = self.closed.write().unwrap();
        if *closed {
            return Ok(());
        }
        self.runtime.block_on(async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(&self.pool)
                .await
        })?;
        *closed = true;
        Ok(())
    }
}
