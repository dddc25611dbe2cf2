//! Vector indexes with cosine similarity search.
//!
//! Every backend implements `VectorIndex`:
//! - `FlatIndex`: exact brute-force search, O(n·d) per query
//! - `IvfIndex` (see `ivf`): inverted-file partitions, approximate
//!
//! Similarity is the inner product of normalized vectors, in [-1, 1]. Results
//! are ordered by similarity descending, then by id ascending, so equal
//! inputs always produce the same output order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::semantic::storage::{read_entry, write_entry, VectorStorageError};
use crate::semantic::vector::dot;
use crate::semantic::EmbeddingVector;

/// Errors that can occur during index operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Search limit k must be positive")]
    InvalidK,
}

/// Search result from a vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    /// Cosine similarity (-1.0 to 1.0)
    pub similarity: f32,
}

/// Which backend an index uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Exact,
    Ivf,
}

impl IndexKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            IndexKind::Exact => 0,
            IndexKind::Ivf => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(IndexKind::Exact),
            1 => Some(IndexKind::Ivf),
            _ => None,
        }
    }
}

/// Common interface of all index backends.
///
/// `search` takes `&self` and is safe to call from many threads at once.
/// `add`, `remove` and `train` need `&mut self`, so mutation has to be
/// synchronized by the owner (e.g. behind an `RwLock`).
pub trait VectorIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    /// Expected embedding dimensions.
    fn dimensions(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace the entry for `id`.
    fn add(&mut self, id: &str, vector: EmbeddingVector) -> Result<(), IndexError>;

    fn get(&self, id: &str) -> Option<&EmbeddingVector>;

    fn remove(&mut self, id: &str) -> Option<EmbeddingVector>;

    /// Up to `k` entries most similar to `query`.
    fn search(&self, query: &EmbeddingVector, k: usize) -> Result<Vec<SearchResult>, IndexError>;

    /// Finish a bulk load. Partitioned backends (re)build their partitions
    /// here; exact backends have nothing to do.
    fn train(&mut self) {}

    /// Write the backend-specific file body (see `storage`).
    fn encode_body(&self, out: &mut dyn Write) -> Result<(), VectorStorageError>;
}

/// Exact brute-force index.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    /// Entry id -> embedding, kept sorted so iteration is deterministic
    entries: BTreeMap<String, EmbeddingVector>,
    dimensions: usize,
}

impl FlatIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            dimensions,
        }
    }

    /// Iterate over all entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EmbeddingVector)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn decode_body(
        input: &mut dyn Read,
        dimensions: usize,
        entry_count: u64,
    ) -> Result<Self, VectorStorageError> {
        let mut index = FlatIndex::new(dimensions);

        for _ in 0..entry_count {
            let (id, vector) = read_entry(input, dimensions)?;
            if index.entries.insert(id.clone(), vector).is_some() {
                return Err(VectorStorageError::InvalidFormat(format!(
                    "duplicate entry id '{}'",
                    id
                )));
            }
        }

        Ok(index)
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Exact
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn add(&mut self, id: &str, vector: EmbeddingVector) -> Result<(), IndexError> {
        check_dimensions(self.dimensions, &vector)?;
        self.entries.insert(id.to_string(), vector);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<&EmbeddingVector> {
        self.entries.get(id)
    }

    fn remove(&mut self, id: &str) -> Option<EmbeddingVector> {
        self.entries.remove(id)
    }

    fn search(&self, query: &EmbeddingVector, k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        check_dimensions(self.dimensions, query)?;

        let hits = self
            .entries
            .iter()
            .map(|(id, vector)| SearchResult {
                id: id.clone(),
                similarity: dot(query.values(), vector.values()),
            })
            .collect();

        Ok(top_k(hits, k))
    }

    fn encode_body(&self, out: &mut dyn Write) -> Result<(), VectorStorageError> {
        for (id, vector) in &self.entries {
            write_entry(out, id, vector)?;
        }
        Ok(())
    }
}

pub(crate) fn check_dimensions(expected: usize, vector: &EmbeddingVector) -> Result<(), IndexError> {
    if vector.dimensions() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            got: vector.dimensions(),
        });
    }
    Ok(())
}

/// Similarity descending, then id ascending.
pub(crate) fn compare_hits(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort hits into result order and keep the first `k`.
pub(crate) fn top_k(mut hits: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
    hits.sort_by(compare_hits);
    hits.truncate(k);
    hits
}
