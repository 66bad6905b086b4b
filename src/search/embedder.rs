//! The embedding contract. No real model ships in this crate — embedding is
//! an external collaborator's job — but a deterministic in-memory double
//! lets the vector searcher and fusion logic be tested without one.

/// Produces dense vectors from text. Implementations are expected to be
/// thread-safe; the searcher layer calls `embed` from concurrent readers.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
    /// Wraps `text` in whatever instruction prefix this model expects for
    /// queries (as opposed to the documents it was trained to embed
    /// symmetrically). Most models need this; a model that doesn't can
    /// return `text` unchanged.
    fn format_query(&self, text: &str) -> String;
}

/// Deterministic test double: hashes the input with BLAKE3 and expands the
/// hash into a unit vector. Same text always produces the same vector;
/// different text produces (with overwhelming probability) a different one.
/// Never use outside tests — it carries no semantic information.
pub struct DeterministicEmbedder {
    dimensions: usize,
    model_name: String,
}

impl DeterministicEmbedder {
    pub fn new(dimensions: usize, model_name: impl Into<String>) -> Self {
        DeterministicEmbedder {
            dimensions,
            model_name: model_name.into(),
        }
    }
}

impl Embedder for DeterministicEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        let mut reader = hasher.finalize_xof();

        let mut bytes = vec![0u8; self.dimensions * 4];
        reader.fill(&mut bytes);

        let mut v: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| {
                let bits = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                (bits as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect();

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn format_query(&self, text: &str) -> String {
        format!("query: {text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_embeds_identically() {
        let embedder = DeterministicEmbedder::new(32, "test");
        assert_eq!(embedder.embed("hello"), embedder.embed("hello"));
    }

    #[test]
    fn different_text_embeds_differently() {
        let embedder = DeterministicEmbedder::new(32, "test");
        assert_ne!(embedder.embed("hello"), embedder.embed("goodbye"));
    }

    #[test]
    fn embeddings_are_unit_length() {
        let embedder = DeterministicEmbedder::new(32, "test");
        let v = embedder.embed("hello world");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn format_query_adds_instruction_prefix() {
        let embedder = DeterministicEmbedder::new(8, "test");
        assert_eq!(embedder.format_query("foo"), "query: foo");
    }
}
