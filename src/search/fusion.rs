//! Reciprocal rank fusion: merges per-searcher ranked lists into one ranked
//! list without needing the searchers' scores to be on comparable scales.

use std::collections::HashMap;

use super::{SearchHit, Searcher};

const DEFAULT_K: f32 = 60.0;

/// Fuses the results of one or more [`Searcher`]s by rank rather than raw
/// score, since BM25 scores and cosine similarities don't live on the same
/// scale. `score(id) = Σ weight · 1/(k + rank)` over the searchers that
/// returned `id` at all; an id absent from a searcher's results contributes
/// nothing from it.
pub struct RrfFusion {
    searchers: Vec<(Box<dyn Searcher>, f32)>,
    k: f32,
}

impl RrfFusion {
    /// `searchers` pairs each searcher with its fusion weight. Weights are
    /// used as given; this type does not normalize them to sum to 1.0.
    pub fn new(searchers: Vec<(Box<dyn Searcher>, f32)>) -> Self {
        RrfFusion { searchers, k: DEFAULT_K }
    }

    /// Overrides the rank-damping constant `k` (default 60).
    pub fn with_k(mut self, k: f32) -> Self {
        self.k = k;
        self
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, super::SearchError> {
        let mut scores: HashMap<String, f32> = HashMap::new();
        let mut matched_terms: HashMap<String, Vec<String>> = HashMap::new();

        for (searcher, weight) in &self.searchers {
            let hits = searcher.search(query, limit.max(1))?;
            for (rank, hit) in hits.into_iter().enumerate() {
                let contribution = weight / (self.k + rank as f32 + 1.0);
                *scores.entry(hit.id.clone()).or_insert(0.0) += contribution;
                matched_terms.entry(hit.id).or_default().extend(hit.matched_terms);
            }
        }

        let mut fused: Vec<SearchHit> = scores
            .into_iter()
            .map(|(id, score)| {
                let mut terms = matched_terms.remove(&id).unwrap_or_default();
                terms.sort();
                terms.dedup();
                SearchHit { id, score, matched_terms: terms }
            })
            .collect();

        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        fused.truncate(limit);
        Ok(fused)
    }
}
