//! Matching orchestrator.
//!
//! Each call walks the same stages:
//! `Init -> EmbedCandidate -> EmbedJobs -> ScoreAll -> Rank -> Filter -> Truncate -> Done`.
//! A failing stage fails the whole call. The exception is a malformed
//! record in the pool being scored, which is skipped and reported in
//! [`MatchOutcome::skipped`].
//!
//! `JobMatcher` keeps no per-call state, so one instance can serve many
//! concurrent calls.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::random;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{EngineConfig, IndexSettings, MatchConfig, RetrySettings};
use crate::error::MatchError;
use crate::models::{Candidate, JobPosting, MatchResult};
use crate::ranking::{self, PairScores};
use crate::scoring::score_features;
use crate::semantic::{
    candidate_text, job_text, EmbeddingBackend, EmbeddingError, EmbeddingGenerator, EmbeddingVector, FlatIndex,
    HashEmbedder, VectorIndex, VectorStorage,
};

/// Model name that selects the built-in feature-hashing backend.
pub const HASH_MODEL: &str = "feature-hash";

/// Steps of one match call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    EmbedCandidate,
    EmbedJobs,
    ScoreAll,
    Rank,
    Filter,
    Truncate,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::EmbedCandidate => "embed_candidate",
            Stage::EmbedJobs => "embed_jobs",
            Stage::ScoreAll => "score_all",
            Stage::Rank => "rank",
            Stage::Filter => "filter",
            Stage::Truncate => "truncate",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Bounded exponential backoff for transient embedding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Wait before retry number `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max) + jitter`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        backoff + self.rand_jitter()
    }

    fn rand_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(random::<u64>() % max_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: Duration::from_millis(settings.jitter_ms),
        }
    }
}

/// Time limits and retry policy of a matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherSettings {
    /// Limit for one embedding batch
    pub embed_timeout: Duration,
    /// Limit for a whole call, enforced up to the rank stage
    pub deadline: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for MatcherSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            embed_timeout: config.embed_timeout(),
            deadline: config.deadline(),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// A record left out of a match, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub id: String,
    pub reason: String,
}

/// Ranked results plus whatever had to be skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub results: Vec<MatchResult>,
    pub skipped: Vec<SkippedItem>,
}

enum BatchFailure {
    TimedOut,
    DeadlineReached,
    Embedding(EmbeddingError),
}

/// Start time of one call and the deadline it runs under, if any.
#[derive(Debug, Clone, Copy)]
struct CallClock {
    started: Instant,
    deadline: Option<Duration>,
}

impl CallClock {
    fn start(deadline: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            deadline,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the deadline; `None` when the call has none.
    fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_sub(self.elapsed()))
    }
}

/// Matches candidates against job postings.
#[derive(Clone)]
pub struct JobMatcher {
    generator: EmbeddingGenerator,
    settings: MatcherSettings,
    pool: Arc<rayon::ThreadPool>,
    job_index: Option<Arc<dyn VectorIndex>>,
}

impl fmt::Debug for JobMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobMatcher")
            .field("generator", &self.generator)
            .field("settings", &self.settings)
            .field("workers", &self.pool.current_num_threads())
            .field("job_index", &self.job_index.as_ref().map(|i| i.len()))
            .finish()
    }
}

impl JobMatcher {
    /// `workers` bounds how many jobs are scored at once.
    pub fn new(generator: EmbeddingGenerator, settings: MatcherSettings, workers: usize) -> Result<Self, MatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("match-worker-{}", i))
            .build()
            .map_err(|e| MatchError::Configuration(format!("failed to start worker pool: {}", e)))?;

        Ok(Self {
            generator,
            settings,
            pool: Arc::new(pool),
            job_index: None,
        })
    }

    /// Build the embedding backend, worker pool and (if configured) the
    /// persisted job index described by `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, MatchError> {
        config.validate()?;

        let backend = build_backend(config)?;
        let generator = EmbeddingGenerator::new(backend).with_batch_size(config.batch_size);
        let mut matcher = Self::new(generator, MatcherSettings::from(config), config.worker_count()?)?;

        if let Some(path) = config.index.path.as_deref().filter(|p| p.exists()) {
            let index = matcher.load_job_index(path)?;
            matcher = matcher.with_job_index(Arc::from(index))?;
        }

        log::info!(
            "matcher ready: model '{}' ({} dims), {} workers",
            matcher.generator.name(),
            matcher.generator.dimensions(),
            matcher.pool.current_num_threads()
        );

        Ok(matcher)
    }

    /// Reuse vectors stored in `index` (keyed by `job_id`) instead of
    /// encoding those jobs again. Keeping the index in sync with the job
    /// records is up to the caller.
    pub fn with_job_index(mut self, index: Arc<dyn VectorIndex>) -> Result<Self, MatchError> {
        if index.dimensions() != self.generator.dimensions() {
            return Err(MatchError::Configuration(format!(
                "job index has {} dimensions, model '{}' produces {}",
                index.dimensions(),
                self.generator.name(),
                self.generator.dimensions()
            )));
        }
        self.job_index = Some(index);
        Ok(self)
    }

    pub fn generator(&self) -> &EmbeddingGenerator {
        &self.generator
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Rank `jobs` for one candidate.
    pub fn match_candidate_to_jobs(
        &self,
        candidate: &Candidate,
        jobs: &[JobPosting],
        config: &MatchConfig,
    ) -> Result<MatchOutcome, MatchError> {
        let _span = tracing::debug_span!("match_candidate", candidate_id = %candidate.candidate_id).entered();
        let clock = CallClock::start(self.settings.deadline);
        log::debug!("{}: candidate '{}' against {} jobs", Stage::Init, candidate.candidate_id, jobs.len());

        let (jobs, skipped) = unique_records(jobs, "job", |j| &j.job_id, |j| j.validate());
        if jobs.is_empty() {
            log::debug!("{}: no jobs to match", Stage::Done);
            return Ok(MatchOutcome {
                results: Vec::new(),
                skipped,
            });
        }

        let candidate_vector = self.encode_one(&clock, Stage::EmbedCandidate, candidate_text(candidate))?;
        self.check_deadline(&clock, Stage::EmbedCandidate)?;

        let job_vectors = self.job_vectors(&clock, Stage::EmbedJobs, &jobs)?;
        self.check_deadline(&clock, Stage::EmbedJobs)?;

        let pairs: Vec<PairScores> = self.pool.install(|| {
            jobs.par_iter()
                .zip(job_vectors.par_iter())
                .map(|(job, job_vector)| score_pair(candidate, &candidate_vector, job, job_vector))
                .collect()
        });
        log::debug!("{}: scored {} jobs", Stage::ScoreAll, pairs.len());
        self.check_deadline(&clock, Stage::ScoreAll)?;

        let results = ranking::rank_and_select(pairs, config);
        log::debug!("{}: {} results in {:?}", Stage::Done, results.len(), clock.elapsed());

        Ok(MatchOutcome { results, skipped })
    }

    /// Rank `candidates` for one job.
    pub fn match_job_to_candidates(
        &self,
        job: &JobPosting,
        candidates: &[Candidate],
        config: &MatchConfig,
    ) -> Result<MatchOutcome, MatchError> {
        let _span = tracing::debug_span!("match_job", job_id = %job.job_id).entered();
        let clock = CallClock::start(self.settings.deadline);
        job.validate().map_err(MatchError::Configuration)?;
        log::debug!("{}: job '{}' against {} candidates", Stage::Init, job.job_id, candidates.len());

        let (candidates, skipped) = unique_records(
            candidates,
            "candidate",
            |c| &c.candidate_id,
            |c| {
                if c.candidate_id.trim().is_empty() {
                    Err("candidate has an empty candidate_id".to_string())
                } else {
                    Ok(())
                }
            },
        );
        if candidates.is_empty() {
            return Ok(MatchOutcome {
                results: Vec::new(),
                skipped,
            });
        }

        let job_vector = self.job_vectors(&clock, Stage::EmbedJobs, &[job])?.pop().unwrap_or_else(|| {
            EmbeddingVector::zeros(self.generator.dimensions())
        });
        self.check_deadline(&clock, Stage::EmbedJobs)?;

        let texts: Vec<String> = candidates.iter().map(|c| candidate_text(c)).collect();
        let candidate_vectors = self.encode_with_retry(&clock, Stage::EmbedCandidate, &texts)?;
        self.check_deadline(&clock, Stage::EmbedCandidate)?;

        let pairs: Vec<PairScores> = self.pool.install(|| {
            candidates
                .par_iter()
                .zip(candidate_vectors.par_iter())
                .map(|(candidate, candidate_vector)| score_pair(candidate, candidate_vector, job, &job_vector))
                .collect()
        });
        log::debug!("{}: scored {} candidates", Stage::ScoreAll, pairs.len());
        self.check_deadline(&clock, Stage::ScoreAll)?;

        let results = ranking::rank_and_select(pairs, config);
        log::debug!("{}: {} results in {:?}", Stage::Done, results.len(), clock.elapsed());

        Ok(MatchOutcome { results, skipped })
    }

    /// Jobs in `pool` most semantically similar to `target`, with
    /// similarity scaled to [0, 100]. `target` itself is never returned.
    pub fn find_similar_jobs(
        &self,
        target: &JobPosting,
        pool: &[JobPosting],
        top_k: usize,
    ) -> Result<Vec<(JobPosting, f64)>, MatchError> {
        if top_k == 0 {
            return Err(MatchError::Configuration("top_k must be a positive integer".to_string()));
        }

        let others: Vec<JobPosting> = pool
            .iter()
            .filter(|j| j.job_id != target.job_id)
            .cloned()
            .collect();
        let (others, skipped) = unique_records(&others, "job", |j| &j.job_id, |j| j.validate());
        if !skipped.is_empty() {
            log::debug!("find_similar_jobs: {} jobs skipped", skipped.len());
        }
        if others.is_empty() {
            return Ok(Vec::new());
        }

        let mut wanted = vec![target];
        wanted.extend(others.iter().copied());
        let mut vectors = self.job_vectors(&CallClock::start(None), Stage::EmbedJobs, &wanted)?;
        let pool_vectors = vectors.split_off(1);
        let target_vector = vectors
            .pop()
            .unwrap_or_else(|| EmbeddingVector::zeros(self.generator.dimensions()));

        let mut index = FlatIndex::new(self.generator.dimensions());
        for (job, vector) in others.iter().zip(pool_vectors) {
            index.add(&job.job_id, vector)?;
        }

        let hits = index.search(&target_vector, top_k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let job = others.iter().find(|j| j.job_id == hit.id)?;
                let similarity = f64::from(hit.similarity).clamp(0.0, 1.0) * 100.0;
                Some(((*job).clone(), similarity))
            })
            .collect())
    }

    /// Encode `jobs` into an index of the configured backend.
    ///
    /// Jobs with a blank or repeated `job_id` are left out.
    pub fn index_jobs(&self, jobs: &[JobPosting], settings: &IndexSettings) -> Result<Box<dyn VectorIndex>, MatchError> {
        let (jobs, skipped) = unique_records(jobs, "job", |j| &j.job_id, |j| j.validate());
        let texts: Vec<String> = jobs.iter().map(|j| job_text(j)).collect();
        let vectors = self.encode_with_retry(&CallClock::start(None), Stage::EmbedJobs, &texts)?;

        let mut index = settings.build(self.generator.dimensions());
        for (job, vector) in jobs.iter().zip(vectors) {
            index.add(&job.job_id, vector)?;
        }
        index.train();

        log::info!(
            "indexed {} jobs ({} skipped) with {:?} backend",
            index.len(),
            skipped.len(),
            index.kind()
        );
        Ok(index)
    }

    /// Persist an index stamped with this matcher's model.
    pub fn save_job_index(&self, index: &dyn VectorIndex, path: &Path) -> Result<(), MatchError> {
        VectorStorage::new(path.to_path_buf()).save(index, &self.generator.model_id_hash())?;
        Ok(())
    }

    /// Load an index written by [`JobMatcher::save_job_index`] for the same model.
    pub fn load_job_index(&self, path: &Path) -> Result<Box<dyn VectorIndex>, MatchError> {
        let storage = VectorStorage::new(path.to_path_buf());
        let index = storage.load(&self.generator.model_id_hash(), self.generator.dimensions())?;
        Ok(index)
    }

    fn check_deadline(&self, clock: &CallClock, stage: Stage) -> Result<(), MatchError> {
        if let Some(deadline) = clock.deadline {
            let elapsed = clock.elapsed();
            if elapsed > deadline {
                log::warn!("{}: deadline of {:?} exceeded ({:?})", stage, deadline, elapsed);
                return Err(MatchError::Timeout { stage, elapsed });
            }
        }
        Ok(())
    }

    /// Vectors for `jobs`, taken from the attached index where present and
    /// encoded otherwise.
    fn job_vectors(
        &self,
        clock: &CallClock,
        stage: Stage,
        jobs: &[&JobPosting],
    ) -> Result<Vec<EmbeddingVector>, MatchError> {
        let mut vectors: Vec<Option<EmbeddingVector>> = jobs
            .iter()
            .map(|job| {
                self.job_index
                    .as_ref()
                    .and_then(|index| index.get(&job.job_id).cloned())
            })
            .collect();

        let missing: Vec<usize> = (0..jobs.len()).filter(|&i| vectors[i].is_none()).collect();
        let texts: Vec<String> = missing.iter().map(|&i| job_text(jobs[i])).collect();
        let encoded = self.encode_with_retry(clock, stage, &texts)?;

        log::debug!(
            "{}: {} vectors reused from index, {} encoded",
            stage,
            jobs.len() - missing.len(),
            missing.len()
        );

        for (i, vector) in missing.into_iter().zip(encoded) {
            vectors[i] = Some(vector);
        }

        let dimensions = self.generator.dimensions();
        Ok(vectors
            .into_iter()
            .map(|v| v.unwrap_or_else(|| EmbeddingVector::zeros(dimensions)))
            .collect())
    }

    fn encode_one(&self, clock: &CallClock, stage: Stage, text: String) -> Result<EmbeddingVector, MatchError> {
        let mut vectors = self.encode_with_retry(clock, stage, &[text])?;
        Ok(vectors
            .pop()
            .unwrap_or_else(|| EmbeddingVector::zeros(self.generator.dimensions())))
    }

    /// Encode batch by batch; every batch gets its own timeout and retries.
    fn encode_with_retry(
        &self,
        clock: &CallClock,
        stage: Stage,
        texts: &[String],
    ) -> Result<Vec<EmbeddingVector>, MatchError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.generator.batch_size()) {
            out.extend(self.encode_batch(clock, stage, batch)?);
        }
        Ok(out)
    }

    fn encode_batch(&self, clock: &CallClock, stage: Stage, batch: &[String]) -> Result<Vec<EmbeddingVector>, MatchError> {
        let retry = &self.settings.retry;
        let mut attempt = 1;

        loop {
            match self.encode_with_timeout(clock, batch.to_vec()) {
                Ok(vectors) => return Ok(vectors),
                Err(BatchFailure::DeadlineReached) => {
                    let elapsed = clock.elapsed();
                    log::warn!("{}: deadline reached while embedding ({:?})", stage, elapsed);
                    return Err(MatchError::Timeout { stage, elapsed });
                }
                Err(BatchFailure::TimedOut) => {
                    log::warn!(
                        "{}: embedding batch of {} timed out after {:?}",
                        stage,
                        batch.len(),
                        self.settings.embed_timeout
                    );
                    return Err(MatchError::Timeout {
                        stage,
                        elapsed: self.settings.embed_timeout,
                    });
                }
                Err(BatchFailure::Embedding(e @ EmbeddingError::DimensionMismatch { .. })) => {
                    return Err(MatchError::Configuration(e.to_string()));
                }
                Err(BatchFailure::Embedding(e)) => {
                    if !e.is_transient() || attempt >= retry.max_attempts {
                        return Err(MatchError::EmbeddingUnavailable { attempts: attempt, source: e });
                    }

                    let delay = retry.delay(attempt);
                    if clock.remaining().is_some_and(|left| left <= delay) {
                        let elapsed = clock.elapsed();
                        log::warn!("{}: no time left to retry after error: {}", stage, e);
                        return Err(MatchError::Timeout { stage, elapsed });
                    }
                    log::warn!(
                        "{}: retrying embedding (attempt {}/{}) after error: {}, backoff {}ms",
                        stage,
                        attempt,
                        retry.max_attempts,
                        e,
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Run one encode call on a helper thread and wait at most
    /// `embed_timeout`, or less when the call's deadline comes first. A
    /// timed-out call keeps running in the background but its result is
    /// dropped.
    fn encode_with_timeout(&self, clock: &CallClock, batch: Vec<String>) -> Result<Vec<EmbeddingVector>, BatchFailure> {
        let (wait, deadline_bound) = match clock.remaining() {
            Some(left) if left.is_zero() => return Err(BatchFailure::DeadlineReached),
            Some(left) if left < self.settings.embed_timeout => (left, true),
            _ => (self.settings.embed_timeout, false),
        };

        let generator = self.generator.clone();
        let (tx, rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("embed".to_string())
            .spawn(move || {
                let _ = tx.send(generator.encode(&batch));
            })
            .map_err(|e| {
                BatchFailure::Embedding(EmbeddingError::EmbeddingFailed(format!(
                    "failed to spawn embedding thread: {}",
                    e
                )))
            })?;

        match rx.recv_timeout(wait) {
            Ok(result) => result.map_err(BatchFailure::Embedding),
            Err(RecvTimeoutError::Timeout) if deadline_bound => Err(BatchFailure::DeadlineReached),
            Err(RecvTimeoutError::Timeout) => Err(BatchFailure::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(BatchFailure::Embedding(EmbeddingError::EmbeddingFailed(
                "embedding thread exited without a result".to_string(),
            ))),
        }
    }
}

fn build_backend(config: &EngineConfig) -> Result<Arc<dyn EmbeddingBackend>, MatchError> {
    if config.model.eq_ignore_ascii_case(HASH_MODEL) {
        return Ok(Arc::new(HashEmbedder::default()));
    }

    #[cfg(feature = "fastembed")]
    {
        use crate::semantic::FastEmbedBackend;

        match FastEmbedBackend::new(&config.model, config.cache_dir()) {
            Ok(backend) => Ok(Arc::new(backend)),
            Err(e @ EmbeddingError::InvalidModel(_)) => Err(MatchError::Configuration(e.to_string())),
            Err(e) => Err(MatchError::EmbeddingUnavailable { attempts: 1, source: e }),
        }
    }

    #[cfg(not(feature = "fastembed"))]
    {
        Err(MatchError::Configuration(format!(
            "model '{}' needs the `fastembed` feature; use '{}' instead",
            config.model, HASH_MODEL
        )))
    }
}

fn score_pair(
    candidate: &Candidate,
    candidate_vector: &EmbeddingVector,
    job: &JobPosting,
    job_vector: &EmbeddingVector,
) -> PairScores {
    let features = score_features(candidate, job);
    let similarity = candidate_vector.cosine(job_vector).unwrap_or(0.0);
    let scores = features.with_semantic(similarity);

    PairScores {
        candidate_id: candidate.candidate_id.clone(),
        job_id: job.job_id.clone(),
        scores,
        skills: features.breakdown,
    }
}

/// Split `items` into valid records with unique ids and skipped ones.
/// The first record with a given id wins.
fn unique_records<'a, T>(
    items: &'a [T],
    kind: &str,
    id_of: impl Fn(&T) -> &String,
    validate: impl Fn(&T) -> Result<(), String>,
) -> (Vec<&'a T>, Vec<SkippedItem>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();

    for item in items {
        let id = id_of(item);
        let reason = match validate(item) {
            Err(reason) => Some(reason),
            Ok(()) if !seen.insert(id.as_str()) => Some(format!("duplicate {} id '{}'", kind, id)),
            Ok(()) => None,
        };

        match reason {
            Some(reason) => {
                log::warn!("skipping {} '{}': {}", kind, id, reason);
                skipped.push(SkippedItem {
                    id: id.clone(),
                    reason,
                });
            }
            None => kept.push(item),
        }
    }

    (kept, skipped)
}
