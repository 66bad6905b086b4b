//! Directory-based BM25 engine predating the FTS5 migration.
//!
//! Plain inverted index persisted as two JSON files: postings keyed by
//! token, and per-document length for the BM25 length-normalization term.
//! Everything lives in memory and is rewritten whole on every mutating call
//! — adequate for the small legacy indexes this backend still serves, not
//! meant to scale the way the relational backend does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::config::Bm25Config;
use crate::tokenizer::tokenize;

use super::{Bm25Doc, Bm25Error, Bm25Hit, Bm25Index, Bm25Stats};

/// Tokenize then drop tokens shorter than `config.min_token_length` or in
/// `config.stop_words`, on top of the tokenizer's own built-in filtering.
fn tokenize_with_config(text: &str, config: &Bm25Config) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.len() >= config.min_token_length && !config.stop_words.iter().any(|s| s == t))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Posting {
    doc_id: String,
    term_freq: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SegmentData {
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: HashMap<String, u32>,
}

impl SegmentData {
    fn avg_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        self.doc_lengths.values().sum::<u32>() as f32 / self.doc_lengths.len() as f32
    }

    fn remove_doc(&mut self, doc_id: &str) {
        self.doc_lengths.remove(doc_id);
        for postings in self.postings.values_mut() {
            postings.retain(|p| p.doc_id != doc_id);
        }
        self.postings.retain(|_, v| !v.is_empty());
    }

    fn add_doc(&mut self, doc_id: &str, tokens: &[String]) {
        self.remove_doc(doc_id);
        self.doc_lengths.insert(doc_id.to_string(), tokens.len() as u32);

        let mut term_freqs: HashMap<&str, u32> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token.as_str()).or_insert(0) += 1;
        }
        for (term, freq) in term_freqs {
            self.postings.entry(term.to_string()).or_default().push(Posting {
                doc_id: doc_id.to_string(),
                term_freq: freq,
            });
        }
    }
}

pub struct SegmentBm25 {
    dir: PathBuf,
    data: RwLock<SegmentData>,
    config: Bm25Config,
    closed: RwLock<bool>,
}

fn data_path(dir: &Path) -> PathBuf {
    dir.join("segment.json")
}

impl SegmentBm25 {
    /// Open with the default [`Bm25Config`]. See [`Self::open_with_config`].
    pub fn open(dir: &Path) -> Result<Self, Bm25Error> {
        Self::open_with_config(dir, &Bm25Config::default())
    }

    pub fn open_with_config(dir: &Path, config: &Bm25Config) -> Result<Self, Bm25Error> {
        std::fs::create_dir_all(dir)?;
        let path = data_path(dir);
        let data = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            SegmentData::default()
        };
        Ok(SegmentBm25 {
            dir: dir.to_path_buf(),
            data: RwLock::new(data),
            config: config.clone(),
            closed: RwLock::new(false),
        })
    }

    fn persist(&self, data: &SegmentData) -> Result<(), Bm25Error> {
        let json = serde_json::to_string(data)?;
        let temp = self.dir.join(".segment.json.tmp");
        std::fs::write(&temp, &json)?;
        std::fs::rename(&temp, data_path(&self.dir))?;
        Ok(())
    }

    fn check_open(&self) -> Result<(), Bm25Error> {
        if *self.closed.read().unwrap() {
            return Err(Bm25Error::IndexClosed);
        }
        Ok(())
    }
}

impl Bm25Index for SegmentBm25 {
    fn index(&self, docs: &[Bm25Doc]) -> Result<(), Bm25Error> {
        self.check_open()?;
        let mut data = self.data.write().unwrap();
        for doc in docs {
            let tokens = tokenize_with_config(&doc.content, &self.config);
            data.add_doc(&doc.id, &tokens);
        }
        self.persist(&data)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<Bm25Hit>, Bm25Error> {
        self.check_open()?;
        let query_tokens = tokenize_with_config(query, &self.config);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let data = self.data.read().unwrap();
        let n = data.doc_lengths.len() as f32;
        if n == 0.0 {
            return Ok(Vec::new());
        }
        let avg_len = data.avg_doc_length();
        let k1 = self.config.k1;
        let b = self.config.b;

        let mut scores: HashMap<String, f32> = HashMap::new();
        let mut matched: HashMap<String, Vec<String>> = HashMap::new();

        for term in &query_tokens {
            let Some(postings) = data.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let doc_len = *data.doc_lengths.get(&posting.doc_id).unwrap_or(&0) as f32;
                let tf = posting.term_freq as f32;
                let denom = tf + k1 * (1.0 - b + b * doc_len / avg_len.max(1.0));
                let term_score = idf * (tf * (k1 + 1.0)) / denom.max(f32::EPSILON);

                *scores.entry(posting.doc_id.clone()).or_insert(0.0) += term_score;
                matched.entry(posting.doc_id.clone()).or_default().push(term.clone());
            }
        }

        let mut hits: Vec<Bm25Hit> = scores
            .into_iter()
            .map(|(id, score)| {
                let mut matched_terms = matched.remove(&id).unwrap_or_default();
                matched_terms.sort();
                matched_terms.dedup();
                Bm25Hit { id, score, matched_terms }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn delete(&self, ids: &[String]) -> Result<(), Bm25Error> {
        self.check_open()?;
        let mut data = self.data.write().unwrap();
        for id in ids {
            data.remove_doc(id);
        }
        self.persist(&data)
    }

    fn all_ids(&self) -> Result<Vec<String>, Bm25Error> {
        self.check_open()?;
        let data = self.data.read().unwrap();
        let mut ids: Vec<String> = data.doc_lengths.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn stats(&self) -> Result<Bm25Stats, Bm25Error> {
        self.check_open()?;
        let data = self.data.read().unwrap();
        Ok(Bm25Stats {
            document_count: data.doc_lengths.len() as u64,
        })
    }

    /// Idempotent: calling `close` again is a no-op, not an error.
    fn close(&self) -> Result<(), Bm25Error> {
        *self.closed.write().unwrap() = true;
        Ok(())
    }
}
