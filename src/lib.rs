//! # hybridex
//!
//! Persistence and retrieval substrate for hybrid code search: a lexical
//! BM25 full-text index, an approximate-nearest-neighbor vector index, and
//! a transactional metadata store binding chunks to files and symbols,
//! sharing one code-aware tokenizer between the lexical and query paths.
//!
//! This crate does not parse source into chunks (beyond the markdown
//! illustration in [`chunker`]) and does not ship an embedding model — both
//! are external collaborators that implement the [`chunker::Chunker`] and
//! [`search::Embedder`] traits respectively.
//!
//! ## Quick start
//!
//! ```no_run
//! use hybridex::bm25::{Bm25Doc, Bm25Index, Bm25Store};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Bm25Store::open(std::path::Path::new("index/bm25.db"))?;
//! store.index(&[Bm25Doc { id: "a".to_string(), content: "fn parse_request()".to_string() }])?;
//! let hits = store.search("parse request", 10)?;
//! # Ok(())
//! # }
//! ```

pub mod bm25;
pub mod chunker;
pub mod config;
pub mod error;
pub mod model;
pub mod search;
pub mod store;
pub mod tokenizer;
pub mod vector;

pub use error::{CancellationToken, RetrievalError};
pub use model::{Chunk, ChunkEmbedding, ContentType, FileRecord, IndexCheckpoint, Project, Symbol, SymbolKind};
