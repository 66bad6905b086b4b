//! The searcher layer: a uniform `search(query, limit)` contract over both
//! indices, plus reciprocal-rank fusion to merge their results into one
//! ranked list.

mod embedder;
mod fusion;

use std::sync::Arc;

pub use embedder::{DeterministicEmbedder, Embedder};
pub use fusion::RrfFusion;

use crate::bm25::{Bm25Index, Bm25Store};
use crate::vector::VectorStore;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Bm25(#[from] crate::bm25::Bm25Error),
    #[error(transparent)]
    Vector(#[from] crate::vector::VectorError),
}

/// One ranked match, uniform across every searcher.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub matched_terms: Vec<String>,
}

pub trait Searcher: Send + Sync {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Forwards verbatim to the BM25 index.
pub struct Bm25Searcher {
    store: Arc<Bm25Store>,
}

impl Bm25Searcher {
    pub fn new(store: Arc<Bm25Store>) -> Self {
        Bm25Searcher { store }
    }
}

impl Searcher for Bm25Searcher {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let hits = self.store.search(query, limit)?;
        Ok(hits
            .into_iter()
            .map(|h| SearchHit {
                id: h.id,
                score: h.score,
                matched_terms: h.matched_terms,
            })
            .collect())
    }
}

/// Applies the embedder's instruction prefix, embeds the query, and searches
/// the vector index with the resulting vector.
pub struct VectorSearcher {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl VectorSearcher {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        VectorSearcher { store, embedder }
    }
}

impl Searcher for VectorSearcher {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let formatted = self.embedder.format_query(query);
        let vector = self.embedder.embed(&formatted);
        let matches = self.store.search(&vector, limit)?;
        Ok(matches
            .into_iter()
            .map(|m| SearchHit {
                id: m.id,
                score: m.score,
                matched_terms: Vec::new(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorConfig;

    #[test]
    fn bm25_searcher_forwards_to_store() {
        let store = Arc::new(Bm25Store::open(&tempfile::tempdir().unwrap().path().join("b")).unwrap());
        store
            .index(&[crate::bm25::Bm25Doc {
                id: "a".to_string(),
                content: "parse request".to_string(),
            }])
            .unwrap();
        let searcher = Bm25Searcher::new(store);
        let hits = searcher.search("parse", 10).unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn vector_searcher_embeds_and_queries_store() {
        let store = Arc::new(VectorStore::new(VectorConfig::new(8), 4));
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder::new(8, "test-embedder"));
        store
            .add(&["a".to_string()], &[embedder.embed("hello world")])
            .unwrap();

        let searcher = VectorSearcher::new(store, embedder);
        let hits = searcher.search("hello world", 5).unwrap();
        assert_eq!(hits[0].id, "a");
    }
}
