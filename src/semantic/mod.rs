//! Embedding generation and vector similarity search.
//!
//! # Architecture
//!
//! - `vector`: L2-normalized embedding vectors
//! - `embeddings`: Backend trait, batching generator, fastembed backend
//! - `hashing`: Model-free feature-hashing backend
//! - `preprocess`: Candidate / job text preparation for embedding input
//! - `index`: `VectorIndex` trait and the exact backend
//! - `ivf`: Approximate inverted-file backend
//! - `storage`: Binary file I/O for index persistence

pub mod embeddings;
mod hashing;
mod index;
mod ivf;
mod preprocess;
mod storage;
mod vector;

#[cfg(feature = "fastembed")]
pub use embeddings::FastEmbedBackend;
pub use embeddings::{EmbeddingBackend, EmbeddingError, EmbeddingGenerator, DEFAULT_BATCH_SIZE};
pub use hashing::{HashEmbedder, DEFAULT_HASH_DIMENSIONS};
pub use index::{FlatIndex, IndexError, IndexKind, SearchResult, VectorIndex};
pub use ivf::{IvfIndex, IvfParams};
pub use preprocess::{candidate_text, job_text};
pub use storage::{VectorStorage, VectorStorageError};
pub use vector::EmbeddingVector;

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
