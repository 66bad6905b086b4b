//! Shared data model: projects, files, chunks, symbols, checkpoints.
//!
//! These types are produced by external collaborators (chunkers, the
//! embedder) and consumed by every store in this crate. None of them carry
//! behavior beyond small constructors and the content-addressable chunk ID
//! scheme, which is load-bearing enough to live here rather than duplicated
//! per store.

use std::collections::HashMap;

/// Coarse content classification used by both files and chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Code,
    Markdown,
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Markdown => "markdown",
            ContentType::Text => "text",
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ContentType::Code),
            "markdown" => Ok(ContentType::Markdown),
            "text" => Ok(ContentType::Text),
            _ => Err(()),
        }
    }
}

/// Kind of code entity a [`Symbol`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Type,
    Variable,
    Constant,
    Method,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Method => "method",
        }
    }
}

impl std::str::FromStr for SymbolKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(SymbolKind::Function),
            "class" => Ok(SymbolKind::Class),
            "interface" => Ok(SymbolKind::Interface),
            "type" => Ok(SymbolKind::Type),
            "variable" => Ok(SymbolKind::Variable),
            "constant" => Ok(SymbolKind::Constant),
            "method" => Ok(SymbolKind::Method),
            _ => Err(()),
        }
    }
}

/// A code entity discovered inside a chunk.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub doc_comment: Option<String>,
}

/// An embedding vector attached to a chunk, tagged with the model that produced it.
#[derive(Debug, Clone)]
pub struct ChunkEmbedding {
    pub model: String,
    pub vector: Vec<f32>,
}

/// The retrievable unit: a function, a markdown section, or similar.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub file_id: String,
    pub file_path: String,
    /// Content with surrounding context (e.g. enclosing imports) prepended.
    pub content: String,
    /// Content without the context prefix — the raw source span.
    pub raw_content: String,
    /// Context prefix (imports/package header) that was prepended to `content`.
    pub context: String,
    pub content_type: ContentType,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbols: Vec<Symbol>,
    pub metadata: HashMap<String, String>,
    pub embedding: Option<ChunkEmbedding>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A tracked source file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: String,
    pub project_id: String,
    pub path: String,
    pub size: u64,
    pub mod_time: i64,
    pub content_hash: String,
    pub language: String,
    pub content_type: ContentType,
    pub indexed_at: i64,
}

/// A logical indexing root.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub root_path: String,
    pub project_type: String,
    pub file_count: u64,
    pub chunk_count: u64,
    pub indexed_at: i64,
    pub version: String,
}

/// Stage of a resumable indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStage {
    Scanning,
    Chunking,
    Embedding,
    Indexing,
    Complete,
}

impl CheckpointStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStage::Scanning => "scanning",
            CheckpointStage::Chunking => "chunking",
            CheckpointStage::Embedding => "embedding",
            CheckpointStage::Indexing => "indexing",
            CheckpointStage::Complete => "complete",
        }
    }
}

impl std::str::FromStr for CheckpointStage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scanning" => Ok(CheckpointStage::Scanning),
            "chunking" => Ok(CheckpointStage::Chunking),
            "embedding" => Ok(CheckpointStage::Embedding),
            "indexing" => Ok(CheckpointStage::Indexing),
            "complete" => Ok(CheckpointStage::Complete),
            _ => Err(()),
        }
    }
}

/// Resume state for an in-progress indexing run.
#[derive(Debug, Clone)]
pub struct IndexCheckpoint {
    pub stage: CheckpointStage,
    pub total: u64,
    pub embedded_count: u64,
    pub timestamp: i64,
    pub embedder_model: String,
}

/// Reserved [`crate::store::MetadataStore`] state keys.
pub mod state_keys {
    pub const INDEX_EMBEDDING_DIM: &str = "index_embedding_dim";
    pub const INDEX_EMBEDDING_MODEL: &str = "index_embedding_model";
    pub const CHUNK_ID_VERSION: &str = "chunk_id_version";
    pub const CHECKPOINT_STAGE: &str = "checkpoint_stage";
    pub const CHECKPOINT_TOTAL: &str = "checkpoint_total";
    pub const CHECKPOINT_EMBEDDED: &str = "checkpoint_embedded";
    pub const CHECKPOINT_TIMESTAMP: &str = "checkpoint_timestamp";
    pub const CHECKPOINT_EMBEDDER_MODEL: &str = "checkpoint_embedder_model";
}

/// Chunk ID scheme recorded at [`state_keys::CHUNK_ID_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkIdVersion {
    /// Legacy: IDs derived from file path + line position. Invalidated by line shifts.
    Position,
    /// Current: IDs derived from file path + content hash. Stable under line shifts.
    Content,
}

impl ChunkIdVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkIdVersion::Position => "position",
            ChunkIdVersion::Content => "content",
        }
    }
}

impl std::str::FromStr for ChunkIdVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "position" => Ok(ChunkIdVersion::Position),
            "content" => Ok(ChunkIdVersion::Content),
            _ => Err(()),
        }
    }
}

/// Compute the content-addressable chunk ID: a hash of `(file_path,
/// content_hash)`. Stable under line shifts since neither input names a line
/// number — only the file identity and the exact bytes of the chunk's raw
/// content feed the hash.
pub fn chunk_id(file_path: &str, content_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(content_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Hash a project's absolute root path into a stable project ID.
pub fn project_id(root_path: &str) -> String {
    blake3::hash(root_path.as_bytes()).to_hex().to_string()
}

/// Hash a project-relative path into a stable file ID.
pub fn file_id(project_relative_path: &str) -> String {
    blake3::hash(project_relative_path.as_bytes())
        .to_hex()
        .to_string()
}

/// BLAKE3 content hash, hex-encoded, used for file-change detection and chunk IDs.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Current wall-clock time as a Unix timestamp (seconds).
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_stable_under_line_shift() {
        // Same file, same content hash (as if surrounding lines moved) -> same ID.
        let id_a = chunk_id("src/lib.rs", "abc123");
        let id_b = chunk_id("src/lib.rs", "abc123");
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn chunk_id_changes_with_content() {
        let id_a = chunk_id("src/lib.rs", "abc123");
        let id_b = chunk_id("src/lib.rs", "def456");
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn content_type_round_trips_through_str() {
        for ct in [ContentType::Code, ContentType::Markdown, ContentType::Text] {
            let s = ct.as_str();
            let parsed: ContentType = s.parse().unwrap();
            assert_eq!(parsed.as_str(), s);
        }
    }
}
