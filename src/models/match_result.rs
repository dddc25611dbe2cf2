use serde::{Deserialize, Serialize};

/// Overall score at or above which a match counts as strong.
const STRONG_MATCH_SCORE: f64 = 75.0;
/// Overall score at or above which a match counts as good.
const GOOD_MATCH_SCORE: f64 = 60.0;

/// Four-bucket label derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_score(overall: f64) -> Self {
        if overall >= 85.0 {
            ConfidenceLevel::VeryHigh
        } else if overall >= 75.0 {
            ConfidenceLevel::High
        } else if overall >= 60.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Per-component scores for one candidate/job pair, each in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
    pub semantic: f64,
    pub location: f64,
}

impl SubScores {
    /// Build from [0, 1] fractions, scaling to [0, 100] and clamping.
    pub fn from_fractions(
        skills: f64,
        experience: f64,
        education: f64,
        semantic: f64,
        location: f64,
    ) -> Self {
        Self {
            skills: to_percent(skills),
            experience: to_percent(experience),
            education: to_percent(education),
            semantic: to_percent(semantic),
            location: to_percent(location),
        }
    }

    /// Clamp every component into [0, 100]; NaN becomes 0.
    pub fn clamped(self) -> Self {
        Self {
            skills: clamp_score(self.skills),
            experience: clamp_score(self.experience),
            education: clamp_score(self.education),
            semantic: clamp_score(self.semantic),
            location: clamp_score(self.location),
        }
    }
}

pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn to_percent(fraction: f64) -> f64 {
    clamp_score(fraction * 100.0)
}

/// One-line reading of the sub-scores, e.g.
/// "Good skills match. Strong experience alignment."
///
/// Skills always get a clause. Experience, education and semantic
/// similarity are only mentioned when they are high enough.
pub fn explain(scores: &SubScores) -> String {
    let mut parts = Vec::with_capacity(4);

    parts.push(if scores.skills >= 80.0 {
        "Excellent skills match"
    } else if scores.skills >= 60.0 {
        "Good skills match"
    } else {
        "Skills match needs improvement"
    });

    if scores.experience >= 80.0 {
        parts.push("Strong experience alignment");
    } else if scores.experience >= 60.0 {
        parts.push("Moderate experience match");
    }

    if scores.education >= 80.0 {
        parts.push("Education requirements met");
    }

    if scores.semantic >= 70.0 {
        parts.push("High semantic similarity");
    }

    format!("{}.", parts.join(". "))
}

/// Named view of a result's sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
    pub semantic: f64,
    pub location: f64,
}

/// One ranked candidate/job match.
///
/// Built only by the ranker; every score is already within [0, 100] and the
/// three skill lists are disjoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    candidate_id: String,
    job_id: String,
    overall_score: f64,
    skills_score: f64,
    experience_score: f64,
    education_score: f64,
    semantic_score: f64,
    location_score: f64,
    matched_skills: Vec<String>,
    partial_skills: Vec<String>,
    missing_skills: Vec<String>,
    confidence_level: ConfidenceLevel,
    explanation: String,
}

impl MatchResult {
    pub(crate) fn new(
        candidate_id: String,
        job_id: String,
        overall_score: f64,
        scores: SubScores,
        matched_skills: Vec<String>,
        partial_skills: Vec<String>,
        missing_skills: Vec<String>,
    ) -> Self {
        let overall_score = clamp_score(overall_score);
        let scores = scores.clamped();

        Self {
            candidate_id,
            job_id,
            overall_score,
            skills_score: scores.skills,
            experience_score: scores.experience,
            education_score: scores.education,
            semantic_score: scores.semantic,
            location_score: scores.location,
            matched_skills,
            partial_skills,
            missing_skills,
            confidence_level: ConfidenceLevel::from_score(overall_score),
            explanation: explain(&scores),
        }
    }

    pub fn candidate_id(&self) -> &str {
        &self.candidate_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn skills_score(&self) -> f64 {
        self.skills_score
    }

    pub fn experience_score(&self) -> f64 {
        self.experience_score
    }

    pub fn education_score(&self) -> f64 {
        self.education_score
    }

    pub fn semantic_score(&self) -> f64 {
        self.semantic_score
    }

    pub fn location_score(&self) -> f64 {
        self.location_score
    }

    /// Required skills the candidate has exactly, in required-skill order.
    pub fn matched_skills(&self) -> &[String] {
        &self.matched_skills
    }

    /// Required skills only covered by a substring match.
    pub fn partial_skills(&self) -> &[String] {
        &self.partial_skills
    }

    /// Required skills with no exact or partial match.
    pub fn missing_skills(&self) -> &[String] {
        &self.missing_skills
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        self.confidence_level
    }

    /// Human-readable summary of the sub-scores, see [`explain`].
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn is_strong_match(&self) -> bool {
        self.overall_score >= STRONG_MATCH_SCORE
    }

    pub fn is_good_match(&self) -> bool {
        self.overall_score >= GOOD_MATCH_SCORE
    }

    /// Number of required skills the candidate lacks outright.
    pub fn skills_gap(&self) -> usize {
        self.missing_skills.len()
    }

    /// `matched / (matched + missing)`. Partial matches count on neither
    /// side. 0 when both lists are empty.
    pub fn skills_match_ratio(&self) -> f64 {
        let total = self.matched_skills.len() + self.missing_skills.len();
        if total == 0 {
            return 0.0;
        }
        self.matched_skills.len() as f64 / total as f64
    }

    pub fn score_breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            skills: self.skills_score,
            experience: self.experience_score,
            education: self.education_score,
            semantic: self.semantic_score,
            location: self.location_score,
        }
    }
}
