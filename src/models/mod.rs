//! Records the matching engine reads and the results it produces.
//!
//! - `candidate`: parsed résumé data
//! - `job`: parsed job posting data
//! - `skills`: case-insensitive skill sets
//! - `education`: the closed degree scale
//! - `classification`: job type and experience level labels
//! - `match_result`: ranked output records

mod candidate;
mod classification;
mod education;
mod job;
mod match_result;
mod skills;

pub use candidate::{Candidate, EducationEntry, ExperienceEntry, EXPERIENCE_YEARS_PER_ROLE};
pub use classification::{ExperienceLevel, JobType};
pub use education::EducationLevel;
pub use job::{parse_experience_years, JobPosting};
pub(crate) use match_result::clamp_score;
pub use match_result::{explain, ConfidenceLevel, MatchResult, ScoreBreakdown, SubScores};
pub use skills::SkillSet;
