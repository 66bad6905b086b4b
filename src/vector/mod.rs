//! Vector index: approximate nearest-neighbor search over dense embeddings
//! via an HNSW graph, with string IDs at the API boundary and integer keys
//! inside the graph.
//!
//! The graph never shrinks: removing a vector only unmaps its ID (see
//! [`Graph`](graph::Graph) docs for why). [`VectorStore::stats`] reports the
//! resulting orphan count so a caller can decide when a [`VectorStore::compact`]
//! is worth its cost.

mod graph;
mod persist;

use std::collections::HashMap;
use std::sync::RwLock;

use hnsw_rs::hnsw::Neighbour;

use crate::config::{Metric, VectorConfig};

use graph::Graph;

pub use persist::probe_dimensions;

#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("ids and vectors length mismatch: {ids} ids, {vectors} vectors")]
    LengthMismatch { ids: usize, vectors: usize },
    #[error("vector index not found at {0}")]
    NotFound(String),
    #[error("index is closed")]
    IndexClosed,
    #[error("{0}")]
    Internal(String),
}

/// One search result: the graph's raw distance alongside the normalized score.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub distance: f32,
    pub score: f32,
}

/// Liveness accounting for the graph: `orphans = graph_nodes - valid_ids`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorStats {
    pub valid_ids: usize,
    pub graph_nodes: usize,
    pub orphans: usize,
}

struct State {
    graph: Graph,
    id_to_key: HashMap<String, u64>,
    key_to_id: HashMap<u64, String>,
    next_key: u64,
}

pub struct VectorStore {
    config: VectorConfig,
    state: RwLock<State>,
    closed: RwLock<bool>,
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn score_for(metric: Metric, distance: f32) -> f32 {
    match metric {
        Metric::Cosine => 1.0 - distance / 2.0,
        Metric::L2 => 1.0 / (1.0 + distance),
    }
}

impl VectorStore {
    /// Create an empty in-memory store sized for `capacity` vectors.
    pub fn new(config: VectorConfig, capacity: usize) -> Self {
        let graph = Graph::new(config.metric, capacity, config.m, 16, config.ef_construction);
        VectorStore {
            config,
            state: RwLock::new(State {
                graph,
                id_to_key: HashMap::new(),
                key_to_id: HashMap::new(),
                next_key: 0,
            }),
            closed: RwLock::new(false),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn check_open(&self) -> Result<(), VectorError> {
        if *self.closed.read().unwrap() {
            return Err(VectorError::IndexClosed);
        }
        Ok(())
    }

    fn prepare(&self, vector: &[f32]) -> Result<Vec<f32>, VectorError> {
        if vector.len() != self.config.dimensions {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimensions,
                got: vector.len(),
            });
        }
        let mut v = vector.to_vec();
        if self.config.metric == Metric::Cosine {
            normalize(&mut v);
        }
        Ok(v)
    }

    /// Insert or replace vectors by ID. Replacing an existing ID lazy-deletes
    /// its old graph node (see module docs) before allocating a fresh key.
    pub fn add(&self, ids: &[String], vectors: &[Vec<f32>]) -> Result<(), VectorError> {
        self.check_open()?;
        if ids.len() != vectors.len() {
            return Err(VectorError::LengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
            });
        }
        if ids.is_empty() {
            return Ok(());
        }

        let prepared: Vec<Vec<f32>> = vectors
            .iter()
            .map(|v| self.prepare(v))
            .collect::<Result<_, _>>()?;

        let mut state = self.state.write().unwrap();
        let mut keys = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(old_key) = state.id_to_key.remove(id) {
                state.key_to_id.remove(&old_key);
            }
            let key = state.next_key;
            state.next_key += 1;
            state.id_to_key.insert(id.clone(), key);
            state.key_to_id.insert(key, id.clone());
            keys.push(key);
        }

        let data: Vec<(&Vec<f32>, usize)> = prepared
            .iter()
            .zip(keys.iter())
            .map(|(v, k)| (v, *k as usize))
            .collect();
        state.graph.insert_batch(&data)
    }

    /// Unmap IDs from the graph. The underlying nodes stay until `compact`.
    pub fn delete(&self, ids: &[String]) -> Result<(), VectorError> {
        self.check_open()?;
        let mut state = self.state.write().unwrap();
        for id in ids {
            if let Some(key) = state.id_to_key.remove(id) {
                state.key_to_id.remove(&key);
            }
        }
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorMatch>, VectorError> {
        self.check_open()?;
        let query = self.prepare(query)?;
        let state = self.state.read().unwrap();
        if state.id_to_key.is_empty() {
            return Ok(Vec::new());
        }

        let graph_size = state.graph.get_nb_point().max(1);
        let ef_search = self.config.ef_search.max(k * 2).min(graph_size.max(self.config.ef_search));
        let neighbours: Vec<Neighbour> = state.graph.search(&query, k, ef_search);

        let metric = self.config.metric;
        let mut matches: Vec<VectorMatch> = neighbours
            .into_iter()
            .filter_map(|n| {
                let id = state.key_to_id.get(&(n.d_id as u64))?.clone();
                Some(VectorMatch {
                    id,
                    distance: n.distance,
                    score: score_for(metric, n.distance),
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(k);
        Ok(matches)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().unwrap().id_to_key.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.state.read().unwrap().id_to_key.len()
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.state.read().unwrap().id_to_key.keys().cloned().collect()
    }

    pub fn stats(&self) -> VectorStats {
        let state = self.state.read().unwrap();
        let valid_ids = state.id_to_key.len();
        let graph_nodes = state.graph.get_nb_point();
        VectorStats {
            valid_ids,
            graph_nodes,
            orphans: graph_nodes.saturating_sub(valid_ids),
        }
    }

    /// Rebuild the graph from scratch using a caller-supplied embedding set
    /// (typically everything the metadata store still has on file), discarding
    /// every orphaned node accumulated by lazy deletion.
    pub fn compact(&self, embeddings: &[(String, Vec<f32>)]) -> Result<(), VectorError> {
        self.check_open()?;
        let fresh = VectorStore::new(self.config.clone(), embeddings.len());
        let ids: Vec<String> = embeddings.iter().map(|(id, _)| id.clone()).collect();
        let vectors: Vec<Vec<f32>> = embeddings.iter().map(|(_, v)| v.clone()).collect();
        fresh.add(&ids, &vectors)?;

        let mut fresh_state = fresh.state.into_inner().unwrap();
        let mut state = self.state.write().unwrap();
        std::mem::swap(&mut *state, &mut fresh_state);
        Ok(())
    }

    /// No persistent resources outlive the store itself; provided so callers
    /// can treat shutdown uniformly across stores. Safe to call more than once.
    pub fn close(&self) -> Result<(), VectorError> {
        *self.closed.write().unwrap() = true;
        Ok(())
    }
}
