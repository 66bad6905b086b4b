//! Strict, fail-fast configuration structs for each store.
//!
//! Every config is `#[serde(deny_unknown_fields)]`: a typo in a config file
//! is a hard error at load time, not a silently-ignored option. There is no
//! global config-file search path here (that is a CLI concern, out of scope
//! for this crate) — callers load or build a config and pass it to `open`.

use serde::{Deserialize, Serialize};

/// Distance metric for the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    L2,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

fn default_min_token_length() -> usize {
    2
}

fn default_stop_words() -> Vec<String> {
    crate::tokenizer::default_stop_words()
}

/// BM25 index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
    pub stop_words: Vec<String>,
    pub min_token_length: usize,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config {
            k1: default_k1(),
            b: default_b(),
            stop_words: default_stop_words(),
            min_token_length: default_min_token_length(),
        }
    }
}

fn default_m() -> usize {
    32
}

fn default_ef_construction() -> usize {
    128
}

fn default_ef_search() -> usize {
    64
}

/// Vector index configuration. `dimensions` has no default — it must come
/// from the embedder in use and is required at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorConfig {
    pub dimensions: usize,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_m")]
    pub m: usize,
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
}

impl VectorConfig {
    pub fn new(dimensions: usize) -> Self {
        VectorConfig {
            dimensions,
            metric: Metric::default(),
            m: default_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
        }
    }
}

fn default_cache_size_mib() -> u32 {
    64
}

/// Metadata store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub cache_size_mib: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        MetadataConfig {
            cache_size_mib: default_cache_size_mib(),
        }
    }
}

/// Error returned when a config string fails to parse or carries unknown fields.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(#[from] toml::de::Error);

impl Bm25Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

impl VectorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

impl MetadataConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}
