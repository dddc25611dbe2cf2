//! Résumé to job-posting matching.
//!
//! Candidates and job postings are embedded into a shared vector space,
//! scored on skills, experience, education and location, and ranked by a
//! configurable weighted sum.
//!
//! ```no_run
//! use resume_match::{EngineConfig, JobMatcher};
//!
//! # fn run(candidate: resume_match::Candidate, jobs: Vec<resume_match::JobPosting>) -> anyhow::Result<()> {
//! let config = EngineConfig::load_with(std::path::Path::new("config.yaml"))?;
//! let matcher = JobMatcher::from_config(&config)?;
//! let outcome = matcher.match_candidate_to_jobs(&candidate, &jobs, &config.matching)?;
//! for result in outcome.results {
//!     println!("{} {:.1}", result.job_id(), result.overall_score());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod ranking;
pub mod scoring;
pub mod semantic;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, EngineConfig, IndexSettings, MatchConfig, RankingWeights, RetrySettings};
pub use error::MatchError;
pub use matcher::{JobMatcher, MatchOutcome, MatcherSettings, RetryPolicy, SkippedItem, Stage};
pub use models::{
    Candidate, ConfidenceLevel, EducationLevel, ExperienceLevel, JobPosting, JobType, MatchResult, SkillSet, SubScores,
};
pub use ranking::{rank, rank_by_component, Component};
