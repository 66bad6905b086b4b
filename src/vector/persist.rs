//! Vector index persistence: the HNSW graph's own binary dump plus a JSON
//! sidecar carrying the ID maps and config the graph file can't express.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::VectorConfig;

use super::graph::Graph;
use super::{State, VectorError, VectorStore};

#[derive(Debug, Serialize, Deserialize)]
struct MetaFile {
    id_map: HashMap<String, u64>,
    next_key: u64,
    config: VectorConfig,
}

fn meta_path(dir: &Path, basename: &str) -> std::path::PathBuf {
    dir.join(format!("{basename}.hnsw.meta"))
}

impl VectorStore {
    /// Dump the graph and write the `.meta` sidecar, each via write-to-temp
    /// then atomic rename so a crash mid-save never leaves a half-written
    /// file at the canonical path.
    pub fn save(&self, dir: &Path, basename: &str) -> Result<(), VectorError> {
        std::fs::create_dir_all(dir)?;
        let state = self.state.read().unwrap();

        let temp_dir = dir.join(format!(".{basename}.tmp"));
        if temp_dir.exists() {
            std::fs::remove_dir_all(&temp_dir)?;
        }
        std::fs::create_dir_all(&temp_dir)?;

        state.graph.file_dump(&temp_dir, basename)?;

        let meta = MetaFile {
            id_map: state.id_to_key.clone(),
            next_key: state.next_key,
            config: self.config.clone(),
        };
        let meta_json = serde_json::to_string(&meta)?;
        let meta_temp = temp_dir.join(format!("{basename}.hnsw.meta"));
        std::fs::write(&meta_temp, &meta_json)?;

        for ext in ["hnsw.graph", "hnsw.data", "hnsw.meta"] {
            let from = temp_dir.join(format!("{basename}.{ext}"));
            let to = dir.join(format!("{basename}.{ext}"));
            if from.exists() {
                std::fs::rename(&from, &to)?;
            }
        }
        let _ = std::fs::remove_dir(&temp_dir);
        Ok(())
    }

    /// Load the `.meta` sidecar first to recover dimensions, metric and the
    /// ID maps, then import the graph itself.
    pub fn load(dir: &Path, basename: &str) -> Result<Self, VectorError> {
        let meta_path = meta_path(dir, basename);
        if !meta_path.exists() {
            return Err(VectorError::NotFound(meta_path.display().to_string()));
        }
        let meta_json = std::fs::read_to_string(&meta_path)?;
        let meta: MetaFile = serde_json::from_str(&meta_json)?;

        let graph = Graph::load(dir, basename, meta.config.metric)?;
        let key_to_id: HashMap<u64, String> = meta
            .id_map
            .iter()
            .map(|(id, key)| (*key, id.clone()))
            .collect();

        Ok(VectorStore {
            config: meta.config,
            state: std::sync::RwLock::new(State {
                graph,
                id_to_key: meta.id_map,
                key_to_id,
                next_key: meta.next_key,
            }),
            closed: std::sync::RwLock::new(false),
        })
    }

    pub fn exists(dir: &Path, basename: &str) -> bool {
        meta_path(dir, basename).exists()
    }
}

/// Read only the `.meta` sidecar to report the stored embedding dimension,
/// without paying the cost of loading the graph. Returns 0 if no index
/// exists yet, so callers can compare against the active embedder's
/// dimensions before committing to a full load.
pub fn probe_dimensions(dir: &Path, basename: &str) -> usize {
    let path = meta_path(dir, basename);
    let Ok(json) = std::fs::read_to_string(path) else {
        return 0;
    };
    serde_json::from_str::<MetaFile>(&json)
        .map(|m| m.config.dimensions)
        .unwrap_or(0)
}
