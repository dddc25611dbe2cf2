//! Embedding generation.
//!
//! - `EmbeddingBackend`: a text embedding model (fastembed, feature hashing, ...)
//! - `EmbeddingGenerator`: the contract layer over a backend. It maps blank
//!   text to the zero vector, batches requests, checks dimensions and
//!   normalizes every output.
//! - `FastEmbedBackend`: local ONNX sentence-embedding models via fastembed

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::semantic::EmbeddingVector;

/// Default number of texts sent to the backend per call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Error type for embedding operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Model returned {got}-dimensional vectors, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Non-finite components, or a zero vector for non-blank text.
    #[error("Model returned an unusable vector: {0}")]
    InvalidVector(String),
}

impl EmbeddingError {
    /// Whether a later attempt with the same input could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::EmbeddingFailed(_))
    }
}

/// A text embedding model.
///
/// Implementations must be deterministic: the same text always maps to the
/// same raw vector for a given model version.
pub trait EmbeddingBackend: Send + Sync {
    /// Model name, including anything that changes its output.
    fn name(&self) -> &str;

    /// Length of every vector this backend returns.
    fn dimensions(&self) -> usize;

    /// Embed a batch of non-blank texts, one raw vector per text, in order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// SHA256 of the model name, used to stamp persisted indexes.
    fn model_id_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.name().as_bytes());
        hasher.finalize().into()
    }
}

/// Turns texts into normalized `EmbeddingVector`s through a backend.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
}

impl std::fmt::Debug for EmbeddingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("model", &self.backend.name())
            .field("dimensions", &self.backend.dimensions())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl EmbeddingGenerator {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dimensions(&self) -> usize {
        self.backend.dimensions()
    }

    pub fn model_id_hash(&self) -> [u8; 32] {
        self.backend.model_id_hash()
    }

    /// Encode texts into vectors, same length and order as the input.
    ///
    /// Blank texts become the zero vector without reaching the backend. Any
    /// backend failure fails the whole call, as does a vector that cannot
    /// carry a signal (non-finite values, or all zeros for non-blank text).
    pub fn encode(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let dimensions = self.backend.dimensions();
        let mut out: Vec<Option<EmbeddingVector>> = vec![None; texts.len()];

        let pending: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter_map(|(idx, text)| {
                if text.trim().is_empty() {
                    out[idx] = Some(EmbeddingVector::zeros(dimensions));
                    None
                } else {
                    Some(idx)
                }
            })
            .collect();

        for chunk in pending.chunks(self.batch_size) {
            let batch: Vec<String> = chunk.iter().map(|&idx| texts[idx].clone()).collect();
            let raw = self.backend.embed_batch(&batch)?;

            if raw.len() != batch.len() {
                return Err(EmbeddingError::EmbeddingFailed(format!(
                    "backend returned {} vectors for {} texts",
                    raw.len(),
                    batch.len()
                )));
            }

            for (&idx, values) in chunk.iter().zip(raw) {
                if values.len() != dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dimensions,
                        got: values.len(),
                    });
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(EmbeddingError::InvalidVector(format!(
                        "non-finite component for text #{}",
                        idx
                    )));
                }
                if values.iter().all(|v| *v == 0.0) {
                    return Err(EmbeddingError::InvalidVector(format!(
                        "zero vector for non-blank text #{}",
                        idx
                    )));
                }
                out[idx] = Some(EmbeddingVector::normalized(values));
            }
        }

        log::debug!(
            "encoded {} texts ({} blank) with '{}'",
            texts.len(),
            texts.len() - pending.len(),
            self.backend.name()
        );

        Ok(out
            .into_iter()
            .map(|v| v.unwrap_or_else(|| EmbeddingVector::zeros(dimensions)))
            .collect())
    }
}

#[cfg(feature = "fastembed")]
pub use self::fast::FastEmbedBackend;

#[cfg(feature = "fastembed")]
mod fast {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use fastembed::{InitOptions, TextEmbedding};

    use super::{EmbeddingBackend, EmbeddingError};

    /// Wrapper around fastembed's TextEmbedding model.
    /// Uses a Mutex because fastembed's embed() requires &mut self.
    pub struct FastEmbedBackend {
        model: Mutex<TextEmbedding>,
        model_name: String,
        dimensions: usize,
    }

    impl FastEmbedBackend {
        /// Load (downloading on first use) the named model.
        ///
        /// Models are cached in the `models/` subdirectory of `cache_dir`.
        pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
            let model_enum = Self::parse_model_name(model_name)?;

            let models_dir = cache_dir.join("models");
            std::fs::create_dir_all(&models_dir).map_err(|e| {
                EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
            })?;

            let options = InitOptions::new(model_enum)
                .with_cache_dir(models_dir)
                .with_show_download_progress(false);

            let mut model = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

            let dimensions = Self::detect_dimensions(&mut model)?;
            log::info!("loaded embedding model '{}' ({} dims)", model_name, dimensions);

            Ok(Self {
                model: Mutex::new(model),
                model_name: model_name.to_string(),
                dimensions,
            })
        }

        /// Parse model name string to fastembed enum.
        pub(crate) fn parse_model_name(
            name: &str,
        ) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
            match name.to_lowercase().as_str() {
                "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
                "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                    Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q)
                }
                "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
                "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
                "bge-large-en-v1.5" | "bgelargeenv15" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
                _ => Err(EmbeddingError::InvalidModel(format!(
                    "Unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5",
                    name
                ))),
            }
        }

        fn detect_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
            let test_embeddings = model.embed(vec!["test"], None).map_err(|e| {
                EmbeddingError::InitFailed(format!("Failed to detect dimensions: {}", e))
            })?;

            test_embeddings
                .first()
                .map(|v| v.len())
                .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
        }
    }

    impl EmbeddingBackend for FastEmbedBackend {
        fn name(&self) -> &str {
            &self.model_name
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(vec![]);
            }

            let mut model = self.model.lock().map_err(|e| {
                EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
            })?;

            model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
        }
    }
}
