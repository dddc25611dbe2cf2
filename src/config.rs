use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::{clamp_score, SubScores};
use crate::semantic::{FlatIndex, IndexKind, IvfIndex, IvfParams, VectorIndex, DEFAULT_BATCH_SIZE, DEFAULT_MODEL};

/// Allowed distance of the weight sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Default minimum overall score kept in results
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 70.0;
/// Default number of results returned
const DEFAULT_TOP_K: usize = 10;
/// Default per-batch embedding timeout in seconds
const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("weight '{name}' must be a finite, non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("weights must sum to 1.0 (±0.001), got {0}")]
    WeightSum(f64),

    #[error("similarity_threshold must be between 0 and 100, got {0}")]
    Threshold(f64),

    #[error("top_k must be a positive integer")]
    ZeroTopK,

    #[error("{0}")]
    Invalid(String),
}

/// Weights of the five sub-scores in the overall score.
///
/// Only constructible through [`RankingWeights::new`] (or deserialization,
/// which goes through it), so every instance is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights", into = "RawWeights")]
pub struct RankingWeights {
    skills: f64,
    experience: f64,
    education: f64,
    semantic: f64,
    location: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawWeights {
    skills: f64,
    experience: f64,
    education: f64,
    semantic: f64,
    #[serde(default)]
    location: f64,
}

impl RankingWeights {
    pub fn new(
        skills: f64,
        experience: f64,
        education: f64,
        semantic: f64,
        location: f64,
    ) -> Result<Self, ConfigError> {
        let named = [
            ("skills", skills),
            ("experience", experience),
            ("education", education),
            ("semantic", semantic),
            ("location", location),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }

        let sum: f64 = named.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }

        Ok(Self {
            skills,
            experience,
            education,
            semantic,
            location,
        })
    }

    pub fn skills(&self) -> f64 {
        self.skills
    }

    pub fn experience(&self) -> f64 {
        self.experience
    }

    pub fn education(&self) -> f64 {
        self.education
    }

    pub fn semantic(&self) -> f64 {
        self.semantic
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    /// Weighted sum of [0, 100] sub-scores, clamped to [0, 100].
    pub fn combine(&self, scores: &SubScores) -> f64 {
        clamp_score(
            self.skills * scores.skills
                + self.experience * scores.experience
                + self.education * scores.education
                + self.semantic * scores.semantic
                + self.location * scores.location,
        )
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            skills: 0.35,
            experience: 0.25,
            education: 0.15,
            semantic: 0.25,
            location: 0.0,
        }
    }
}

impl TryFrom<RawWeights> for RankingWeights {
    type Error = ConfigError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Self::new(raw.skills, raw.experience, raw.education, raw.semantic, raw.location)
    }
}

impl From<RankingWeights> for RawWeights {
    fn from(w: RankingWeights) -> Self {
        Self {
            skills: w.skills,
            experience: w.experience,
            education: w.education,
            semantic: w.semantic,
            location: w.location,
        }
    }
}

/// Per-call matching options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatchConfig", into = "RawMatchConfig")]
pub struct MatchConfig {
    similarity_threshold: f64,
    top_k: usize,
    weights: RankingWeights,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawMatchConfig {
    #[serde(default = "default_similarity_threshold")]
    similarity_threshold: f64,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    weights: RankingWeights,
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl MatchConfig {
    /// `similarity_threshold` is on the 0-100 overall-score scale.
    pub fn new(similarity_threshold: f64, top_k: usize, weights: RankingWeights) -> Result<Self, ConfigError> {
        if !(0.0..=100.0).contains(&similarity_threshold) {
            return Err(ConfigError::Threshold(similarity_threshold));
        }
        if top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }

        Ok(Self {
            similarity_threshold,
            top_k,
            weights,
        })
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            weights: RankingWeights::default(),
        }
    }
}

impl TryFrom<RawMatchConfig> for MatchConfig {
    type Error = ConfigError;

    fn try_from(raw: RawMatchConfig) -> Result<Self, Self::Error> {
        Self::new(raw.similarity_threshold, raw.top_k, raw.weights)
    }
}

impl From<MatchConfig> for RawMatchConfig {
    fn from(c: MatchConfig) -> Self {
        Self {
            similarity_threshold: c.similarity_threshold,
            top_k: c.top_k,
            weights: c.weights,
        }
    }
}

/// Retry policy for transient embedding failures
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the exponential part of the delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the random delay added to each wait
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    2000
}

fn default_jitter_ms() -> u64 {
    100
}

/// Vector index backend selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub backend: IndexKind,

    /// IVF cluster count; `sqrt(n)` when unset
    #[serde(default)]
    pub nlist: Option<usize>,

    /// IVF clusters scanned per query
    #[serde(default = "default_nscan")]
    pub nscan: usize,

    /// Persisted job index to load at startup
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexKind::Exact,
            nlist: None,
            nscan: default_nscan(),
            path: None,
        }
    }
}

fn default_nscan() -> usize {
    IvfParams::default().nscan
}

impl IndexSettings {
    /// Empty index of the configured backend.
    pub fn build(&self, dimensions: usize) -> Box<dyn VectorIndex> {
        match self.backend {
            IndexKind::Exact => Box::new(FlatIndex::new(dimensions)),
            IndexKind::Ivf => Box::new(IvfIndex::new(
                dimensions,
                IvfParams {
                    nlist: self.nlist,
                    nscan: self.nscan,
                    ..IvfParams::default()
                },
            )),
        }
    }
}

/// Engine configuration, stored as YAML.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Embedding model: a fastembed model name, or "feature-hash"
    #[serde(default = "default_model")]
    pub model: String,

    /// Where downloaded models are cached
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Texts per embedding call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Scoring parallelism: "auto" or a positive integer
    #[serde(default = "default_worker_threads")]
    pub worker_threads: String,

    /// Timeout for one embedding batch in seconds
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Overall time limit of a match call, checked before ranking
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub matching: MatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            cache_dir: None,
            batch_size: default_batch_size(),
            worker_threads: default_worker_threads(),
            embed_timeout_secs: default_embed_timeout_secs(),
            deadline_secs: None,
            retry: RetrySettings::default(),
            index: IndexSettings::default(),
            matching: MatchConfig::default(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_worker_threads() -> String {
    "auto".to_string()
}

fn default_embed_timeout_secs() -> u64 {
    DEFAULT_EMBED_TIMEOUT_SECS
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be greater than 0".to_string()));
        }

        self.worker_count()?;

        if self.embed_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "embed_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.deadline_secs == Some(0) {
            return Err(ConfigError::Invalid("deadline_secs must be greater than 0".to_string()));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }

        if self.index.nlist == Some(0) {
            return Err(ConfigError::Invalid("index.nlist must be greater than 0".to_string()));
        }

        if self.index.nscan == 0 {
            return Err(ConfigError::Invalid("index.nscan must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Number of scoring threads.
    pub fn worker_count(&self) -> Result<usize, ConfigError> {
        if self.worker_threads == "auto" {
            return Ok(std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1));
        }

        match self.worker_threads.parse::<usize>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid(format!(
                "worker_threads must be 'auto' or a positive integer, got '{}'",
                self.worker_threads
            ))),
            Ok(n) => Ok(n),
        }
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("resume-match"))
    }

    /// Load the config file at `path`, writing a default one first if it
    /// does not exist yet.
    pub fn load_with(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let default_str = serde_yml::to_string(&Self::default())?;
            std::fs::write(path, default_str)
                .with_context(|| format!("failed to write default config to {}", path.display()))?;
            log::info!("wrote default config to {}", path.display());
        }

        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("config {} is malformed", path.display()))?;

        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(self)?;
        std::fs::write(path, config_str)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
