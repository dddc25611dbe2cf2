use std::time::Duration;

use crate::config::ConfigError;
use crate::matcher::Stage;
use crate::semantic::{EmbeddingError, IndexError, VectorStorageError};

/// Failure of a whole match operation.
///
/// Per-job problems never surface here; they are reported as skipped items
/// next to the results.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// Invalid weights, `top_k`, dimensions or engine settings. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding model unavailable after {attempts} attempt(s): {source}")]
    EmbeddingUnavailable {
        attempts: u32,
        #[source]
        source: EmbeddingError,
    },

    #[error("Timed out during {stage} after {elapsed:?}")]
    Timeout { stage: Stage, elapsed: Duration },

    /// The index file must be rebuilt from source embeddings.
    #[error("Index file is corrupt or incompatible: {0}")]
    IndexCorrupt(#[source] VectorStorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for MatchError {
    fn from(e: ConfigError) -> Self {
        MatchError::Configuration(e.to_string())
    }
}

impl From<IndexError> for MatchError {
    fn from(e: IndexError) -> Self {
        MatchError::Configuration(e.to_string())
    }
}

impl From<VectorStorageError> for MatchError {
    fn from(e: VectorStorageError) -> Self {
        match e {
            VectorStorageError::Io(io) => MatchError::Io(io),
            other => MatchError::IndexCorrupt(other),
        }
    }
}
