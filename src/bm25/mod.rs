//! BM25 full-text index.
//!
//! Two backends share one contract: [`relational`] is a SQLite FTS5-backed
//! engine (current format), [`segment`] is a hand-rolled directory-based
//! inverted index kept for indexes created before the FTS5 migration.
//! [`Bm25Store::open`] picks between them by looking at what's on disk next
//! to the requested path — a `.db` file means relational, a directory means
//! segment — so callers never need to know which one they ended up with.

mod relational;
mod segment;

use std::path::{Path, PathBuf};

pub use relational::RelationalBm25;
pub use segment::SegmentBm25;

use crate::config::Bm25Config;

#[derive(Debug, thiserror::Error)]
pub enum Bm25Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("index corrupted: {0}")]
    Corrupt(String),
    #[error("index is closed")]
    IndexClosed,
}

/// One document to index: an opaque ID and its raw (pre-tokenization) content.
#[derive(Debug, Clone)]
pub struct Bm25Doc {
    pub id: String,
    pub content: String,
}

/// A ranked BM25 match. `score` follows the "higher is better" convention
/// regardless of the backend's native scoring direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Hit {
    pub id: String,
    pub score: f32,
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bm25Stats {
    pub document_count: u64,
}

/// The operation contract both backends implement identically.
pub trait Bm25Index {
    fn index(&self, docs: &[Bm25Doc]) -> Result<(), Bm25Error>;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<Bm25Hit>, Bm25Error>;
    fn delete(&self, ids: &[String]) -> Result<(), Bm25Error>;
    fn all_ids(&self) -> Result<Vec<String>, Bm25Error>;
    fn stats(&self) -> Result<Bm25Stats, Bm25Error>;
    fn close(&self) -> Result<(), Bm25Error>;
}

/// Dispatches to whichever backend is present on disk, or creates a fresh
/// relational index when nothing exists yet.
pub enum Bm25Store {
    Relational(RelationalBm25),
    Segment(SegmentBm25),
}

impl Bm25Store {
    /// Open with the default [`Bm25Config`]. See [`Self::open_with_config`].
    pub fn open(path: &Path) -> Result<Self, Bm25Error> {
        Self::open_with_config(path, &Bm25Config::default())
    }

    pub fn open_with_config(path: &Path, config: &Bm25Config) -> Result<Self, Bm25Error> {
        let db_path = relational_path(path);
        let segment_dir = segment_path(path);

        if segment_dir.is_dir() {
            return Ok(Bm25Store::Segment(SegmentBm25::open_with_config(
                &segment_dir,
                config,
            )?));
        }
        Ok(Bm25Store::Relational(RelationalBm25::open_with_config(
            &db_path, config,
        )?))
    }
}

fn relational_path(path: &Path) -> PathBuf {
    if path.extension().map(|e| e == "db").unwrap_or(false) {
        path.to_path_buf()
    } else {
        path.with_extension("db")
    }
}

fn segment_path(path: &Path) -> PathBuf {
    path.with_extension("")
}

impl Bm25Index for Bm25Store {
    fn index(&self, docs: &[Bm25Doc]) -> Result<(), Bm25Error> {
        match self {
            Bm25Store::Relational(b) => b.index(docs),
            Bm25Store::Segment(b) => b.index(docs),
        }
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<Bm25Hit>, Bm25Error> {
        match self {
            Bm25Store::Relational(b) => b.search(query, limit),
            Bm25Store::Segment(b) => b.search(query, limit),
        }
    }

    fn delete(&self, ids: &[String]) -> Result<(), Bm25Error> {
        match self {
            Bm25Store::Relational(b) => b.delete(ids),
            Bm25Store::Segment(b) => b.delete(ids),
        }
    }

    fn all_ids(&self) -> Result<Vec<String>, Bm25Error> {
        match self {
            Bm25Store::Relational(b) => b.all_ids(),
            Bm25Store::Segment(b) => b.all_ids(),
        }
    }

    fn stats(&self) -> Result<Bm25Stats, Bm25Error> {
        match self {
            Bm25Store::Relational(b) => b.stats(),
            Bm25Store::Segment(b) => b.stats(),
        }
    }

    fn close(&self) -> Result<(), Bm25Error> {
        match self {
            Bm25Store::Relational(b) => b.close(),
            Bm25Store::Segment(b) => b.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_picks_relational_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25");
        let store = Bm25Store::open(&path).unwrap();
        assert!(matches!(store, Bm25Store::Relational(_)));
    }

    #[test]
    fn open_picks_segment_when_directory_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25");
        std::fs::create_dir_all(&path).unwrap();
        let store = Bm25Store::open(&path).unwrap();
        assert!(matches!(store, Bm25Store::Segment(_)));
    }
}
