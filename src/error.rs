//! Crate-wide error aggregation and the cooperative cancellation handle.
//!
//! Each store owns an error enum scoped to its own boundary
//! ([`crate::bm25::Bm25Error`], [`crate::vector::VectorError`],
//! [`crate::store::StoreError`]). [`RetrievalError`] is the type the searcher
//! layer and other cross-component glue return, with `#[from]` conversions
//! from each component error so call sites can use `?` freely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bm25::Bm25Error;
use crate::store::StoreError;
use crate::vector::VectorError;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Bm25(#[from] Bm25Error),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("dependency missing: {0}")]
    DependencyMissing(String),
    #[error("operation cancelled")]
    Cancelled,
}

/// A cheaply-clonable cooperative cancellation handle.
///
/// Checked between batch items and before committing a transaction in any
/// operation that spans an external boundary (embedder call, large batch
/// write). Tokenization and other purely CPU-bound work never checks this —
/// there is no meaningful point at which to interrupt it early.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
