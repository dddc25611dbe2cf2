use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::classification::lenient;
use crate::models::{EducationLevel, ExperienceLevel, JobType, SkillSet};

static YEARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*\+?\s*(?:years?|yrs?)\b").expect("valid years regex")
});

/// A parsed job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_id: String,
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub required_skills: SkillSet,
    #[serde(default)]
    pub min_experience_years: Option<u32>,
    #[serde(default)]
    pub min_education_level: Option<EducationLevel>,
    /// Unrecognised labels read as `None`.
    #[serde(default, deserialize_with = "lenient")]
    pub job_type: Option<JobType>,
    #[serde(default, deserialize_with = "lenient")]
    pub experience_level: Option<ExperienceLevel>,
}

impl JobPosting {
    /// Years of experience the posting asks for.
    ///
    /// Uses the structured field when set, otherwise looks for a
    /// "N+ years" phrase in the requirements text.
    pub fn required_years(&self) -> Option<f64> {
        self.min_experience_years
            .or_else(|| parse_experience_years(&self.requirements))
            .map(f64::from)
    }

    /// Check that the posting can take part in a match.
    pub fn validate(&self) -> Result<(), String> {
        if self.job_id.trim().is_empty() {
            return Err("job posting has an empty job_id".to_string());
        }
        Ok(())
    }
}

/// Extract the first "N years" / "N+ yrs" requirement from free text.
///
/// A number too large for `u32` yields `None`.
pub fn parse_experience_years(text: &str) -> Option<u32> {
    YEARS_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
