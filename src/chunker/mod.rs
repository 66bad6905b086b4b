//! The chunker contract: produces [`Chunk`]s from raw file bytes.
//!
//! Language-specific (tree-sitter-backed) chunkers are out of scope for this
//! crate; [`markdown::MarkdownChunker`] is the one concrete implementation
//! it ships, mainly to exercise the trait end-to-end.

pub mod markdown;

pub use markdown::MarkdownChunker;

use crate::model::Chunk;

/// Raw input to a chunker: one file's bytes plus what the caller already
/// knows about it.
pub struct ChunkInput<'a> {
    pub path: &'a str,
    pub bytes: &'a [u8],
    pub language: &'a str,
}

/// Produces chunks from a file. Implementations must populate `id` via
/// [`crate::model::chunk_id`], set `content_type`/`language`, use 1-indexed
/// inclusive line spans, and return an empty `Vec` (never some sentinel) for
/// empty input.
pub trait Chunker: Send + Sync {
    fn chunk(&self, input: &ChunkInput<'_>) -> Vec<Chunk>;
}
