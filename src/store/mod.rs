//! Transactional metadata store: projects, files, chunks, symbols, and a
//! small key/value `state` table used for schema bookkeeping and resumable
//! indexing checkpoints.
//!
//! sqlx's query surface is async; this crate exposes a synchronous API, so
//! every public method drives a private single-threaded [`tokio::runtime::Runtime`]
//! with `block_on`. Nothing async leaks across the crate boundary.

mod chunks;
mod cursor;
mod files;
mod projects;
mod state;
mod symbols;

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::runtime::Runtime;

pub use cursor::{decode as decode_cursor, encode as encode_cursor};

use crate::config::MetadataConfig;

const SCHEMA_SQL: &str = include_str!("schema.sql");
const SCHEMA_VERSION: i64 = 1;

/// Forward-only migration steps, applied in order inside one transaction
/// when the stored `schema_version` is older than [`SCHEMA_VERSION`]. Each
/// entry's statements bring the schema from `target_version - 1` to
/// `target_version`. Empty for now — this is the only schema version this
/// build has ever shipped — but `init_schema` already drives off this table
/// so the next bump only needs a new entry here, not new control flow.
const MIGRATIONS: &[(i64, &str)] = &[];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("schema version mismatch: database has {found}, this build expects {expected}")]
    SchemaMismatch { expected: i64, found: i64 },
}

/// A page of results plus an opaque cursor for the next page, if any.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Debug)]
pub struct MetadataStore {
    pool: SqlitePool,
    runtime: Runtime,
}

impl MetadataStore {
    /// Open (creating if absent) the metadata database at `path` with
    /// default configuration.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_config(path, &MetadataConfig::default())
    }

    /// Open (creating if absent) the metadata database at `path`, applying
    /// WAL pragmas, the schema's `CREATE TABLE IF NOT EXISTS` statements, and
    /// `config`'s page cache size.
    pub fn open_with_config(path: &Path, config: &MetadataConfig) -> Result<Self, StoreError> {
        let runtime = Runtime::new()?;
        let pool = runtime.block_on(Self::connect(path, config))?;
        let store = MetadataStore { pool, runtime };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a private in-memory database. Used by tests and short-lived
    /// tooling that never needs to persist across a process restart.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let runtime = Runtime::new()?;
        let options = Self::connect_options(
            SqliteConnectOptions::new().filename(":memory:"),
            &MetadataConfig::default(),
        );
        let pool = runtime.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options),
        )?;
        let store = MetadataStore { pool, runtime };
        store.init_schema()?;
        Ok(store)
    }

    fn connect_options(options: SqliteConnectOptions, config: &MetadataConfig) -> SqliteConnectOptions {
        let cache_size_kib = i64::from(config.cache_size_mib) * 1024;
        options
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(5000))
            .foreign_keys(true)
            // Negative cache_size is in KiB rather than pages (SQLite's pragma semantics).
            .pragma("cache_size", format!("-{cache_size_kib}"))
    }

    async fn connect(path: &Path, config: &MetadataConfig) -> Result<SqlitePool, sqlx::Error> {
        let options = Self::connect_options(SqliteConnectOptions::new().filename(path), config);

        SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            for statement in SCHEMA_SQL.split(';') {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                sqlx::query(statement).execute(&self.pool).await?;
            }
            Ok::<(), sqlx::Error>(())
        })?;

        match self.get_state(state::SCHEMA_VERSION_KEY)? {
            Some(found) => {
                let found: i64 = found
                    .parse()
                    .map_err(|_| StoreError::SchemaMismatch { expected: SCHEMA_VERSION, found: -1 })?;
                if found > SCHEMA_VERSION {
                    return Err(StoreError::SchemaMismatch { expected: SCHEMA_VERSION, found });
                }
                if found < SCHEMA_VERSION {
                    self.migrate_from(found)?;
                }
            }
            None => self.set_state(state::SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_string())?,
        }
        Ok(())
    }

    /// Runs every migration step with `target_version` in `(found, SCHEMA_VERSION]`
    /// inside one transaction, then stamps the new version in the same
    /// transaction so a crash mid-migration never leaves a half-migrated
    /// schema claiming to be current.
    fn migrate_from(&self, found: i64) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (target_version, sql) in MIGRATIONS {
                if *target_version <= found || *target_version > SCHEMA_VERSION {
                    continue;
                }
                for statement in sql.split(';') {
                    let statement = statement.trim();
                    if statement.is_empty() {
                        continue;
                    }
                    sqlx::query(statement).execute(&mut *tx).await?;
                }
            }
            sqlx::query(
                "INSERT INTO state (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(state::SCHEMA_VERSION_KEY)
            .bind(SCHEMA_VERSION.to_string())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<(), sqlx::Error>(())
        })?;
        Ok(())
    }

    /// Flush the WAL back into the main database file. Call before a clean
    /// shutdown so a crash immediately after doesn't leave work stranded in
    /// the WAL.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(&self.pool)
                .await
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_initializes_schema_version() {
        let store = MetadataStore::open_in_memory().unwrap();
        let version = store.get_state(state::SCHEMA_VERSION_KEY).unwrap();
        assert_eq!(version, Some(SCHEMA_VERSION.to_string()));
    }

    #[test]
    fn reopening_same_file_preserves_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        {
            let store = MetadataStore::open(&path).unwrap();
            store.checkpoint().unwrap();
        }
        let store = MetadataStore::open(&path).unwrap();
        assert_eq!(
            store.get_state(state::SCHEMA_VERSION_KEY).unwrap(),
            Some(SCHEMA_VERSION.to_string())
        );
    }

    #[test]
    fn older_stored_version_migrates_forward_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        {
            let store = MetadataStore::open(&path).unwrap();
            store.checkpoint().unwrap();
        }

        // Simulate a database last written by a build that shipped an older
        // schema version than this one.
        {
            let store = MetadataStore::open(&path).unwrap();
            store.set_state(state::SCHEMA_VERSION_KEY, "0").unwrap();
            store.checkpoint().unwrap();
        }

        let reopened = MetadataStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_state(state::SCHEMA_VERSION_KEY).unwrap(),
            Some(SCHEMA_VERSION.to_string())
        );
    }

    #[test]
    fn open_with_config_applies_cache_size_pragma() {
        use crate::config::MetadataConfig;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        let config = MetadataConfig { cache_size_mib: 8 };
        let store = MetadataStore::open_with_config(&path, &config).unwrap();

        let reported: i64 = store
            .runtime
            .block_on(async {
                sqlx::query_scalar("PRAGMA cache_size")
                    .fetch_one(&store.pool)
                    .await
            })
            .unwrap();
        assert_eq!(reported, -(8 * 1024));
    }

    #[test]
    fn newer_stored_version_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.db");
        {
            let store = MetadataStore::open(&path).unwrap();
            store
                .set_state(state::SCHEMA_VERSION_KEY, &(SCHEMA_VERSION + 1).to_string())
                .unwrap();
            store.checkpoint().unwrap();
        }

        let err = MetadataStore::open(&path).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaMismatch { expected, found } if expected == SCHEMA_VERSION && found == SCHEMA_VERSION + 1
        ));
    }
}
