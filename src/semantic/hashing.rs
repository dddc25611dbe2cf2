//! Feature-hashing embedding backend.
//!
//! Needs no model files: lowercase word unigrams and bigrams are hashed with
//! SHA256 into a fixed number of buckets, with a hash-derived sign to reduce
//! collision bias. Output is deterministic across runs and platforms.
//!
//! Changing the tokenizer, the weights or `HASH_VERSION` changes every vector;
//! bump `HASH_VERSION` so persisted indexes are rejected as a model mismatch.

use sha2::{Digest, Sha256};

use crate::semantic::embeddings::{EmbeddingBackend, EmbeddingError};

const HASH_VERSION: &str = "v1";

/// Default output dimension.
pub const DEFAULT_HASH_DIMENSIONS: usize = 384;

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic bag-of-words embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            name: format!("feature-hash-{}-{}", HASH_VERSION, dimensions),
        }
    }

    /// Raw (unnormalized) vector for one text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let mut tokens = tokenize(text);

        // Text made only of punctuation still carries some signal.
        if tokens.is_empty() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return vector;
            }
            tokens.push(trimmed.to_lowercase());
        }

        for token in &tokens {
            self.accumulate(&mut vector, token, UNIGRAM_WEIGHT);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[0..8]);

        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSIONS)
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Lowercase words; keeps `+`, `#` and inner `.` so "c++", "c#" and
/// "node.js" survive as single tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#' || c == '.'))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty() && t.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}
