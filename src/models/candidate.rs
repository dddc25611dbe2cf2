use serde::{Deserialize, Serialize};

use crate::models::{EducationLevel, SkillSet};

/// Years credited per listed role when estimating total experience.
///
/// Résumé durations are free text and are not parsed; the role count is the
/// only signal used.
pub const EXPERIENCE_YEARS_PER_ROLE: f64 = 2.5;

/// A single position from a résumé's experience section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    /// Free-form duration as written on the résumé ("2019 - 2022", "3 yrs").
    #[serde(default)]
    pub duration_text: String,
    #[serde(default)]
    pub description: String,
}

/// A single entry from a résumé's education section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    #[serde(default)]
    pub year: Option<u16>,
}

/// A parsed résumé.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub skills: SkillSet,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
}

impl Candidate {
    /// Approximate years of experience: one fixed block per listed role.
    pub fn experience_years(&self) -> f64 {
        self.experience.len() as f64 * EXPERIENCE_YEARS_PER_ROLE
    }

    /// Highest degree on the résumé.
    ///
    /// `None` means there are no education records at all. Records whose
    /// degree text is not recognised count as `NoDegree`.
    pub fn education_level(&self) -> Option<EducationLevel> {
        if self.education.is_empty() {
            return None;
        }

        let level = self
            .education
            .iter()
            .filter_map(|e| EducationLevel::parse(&e.degree))
            .max()
            .unwrap_or(EducationLevel::NoDegree);

        Some(level)
    }
}
