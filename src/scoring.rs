//! Structured feature scores for a candidate/job pair.
//!
//! Every function here is pure and total: missing data falls back to a
//! fixed default instead of failing. Scores are fractions in [0, 1].

use crate::models::{Candidate, EducationLevel, JobPosting, SkillSet, SubScores};

/// Credit given for a substring-only skill match.
const PARTIAL_SKILL_CREDIT: f64 = 0.5;

/// Location fit of an on-site job. Commute feasibility is not modelled.
pub const ONSITE_LOCATION_SCORE: f64 = 0.8;

/// How the required skills of a job are covered by a candidate.
///
/// Each required skill lands in exactly one list, in required-skill order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillBreakdown {
    pub matched: Vec<String>,
    pub partial: Vec<String>,
    pub missing: Vec<String>,
}

impl SkillBreakdown {
    fn required_count(&self) -> usize {
        self.matched.len() + self.partial.len() + self.missing.len()
    }

    /// `(exact + 0.5 * partial) / required`, 1.0 when nothing is required.
    pub fn score(&self) -> f64 {
        let required = self.required_count();
        if required == 0 {
            return 1.0;
        }

        let credit = self.matched.len() as f64 + PARTIAL_SKILL_CREDIT * self.partial.len() as f64;
        (credit / required as f64).min(1.0)
    }
}

/// Classify each required skill as matched, partial or missing.
///
/// Comparison is case-insensitive. A required skill with no exact match is
/// partial when it is a substring of a candidate skill or the other way round.
pub fn compare_skills(candidate: &SkillSet, required: &SkillSet) -> SkillBreakdown {
    let mut breakdown = SkillBreakdown::default();

    for (skill, key) in required.entries() {
        if candidate.contains(key) {
            breakdown.matched.push(skill.to_string());
        } else if candidate
            .keys()
            .any(|have| have.contains(key) || key.contains(have))
        {
            breakdown.partial.push(skill.to_string());
        } else {
            breakdown.missing.push(skill.to_string());
        }
    }

    breakdown
}

pub fn skills_score(candidate: &SkillSet, required: &SkillSet) -> f64 {
    compare_skills(candidate, required).score()
}

/// Step function over the ratio of candidate to required years.
pub fn experience_score(candidate_years: f64, required_years: Option<f64>) -> f64 {
    let Some(required) = required_years.filter(|r| r.is_finite()) else {
        return 1.0;
    };

    if candidate_years >= required {
        1.0
    } else if candidate_years >= required * 0.7 {
        0.8
    } else if candidate_years >= required * 0.5 {
        0.6
    } else {
        0.4
    }
}

/// Degree fit: full credit at or above the requirement, 0.7 one level
/// below, 0.5 otherwise. `candidate` is `None` when the résumé has no
/// education records.
pub fn education_score(candidate: Option<EducationLevel>, required: Option<EducationLevel>) -> f64 {
    let Some(required) = required else {
        return 1.0;
    };
    let Some(candidate) = candidate else {
        return 0.5;
    };

    if candidate >= required {
        1.0
    } else if candidate.ordinal() + 1 == required.ordinal() {
        0.7
    } else {
        0.5
    }
}

pub fn location_score(job_is_remote: bool) -> f64 {
    if job_is_remote {
        1.0
    } else {
        ONSITE_LOCATION_SCORE
    }
}

/// Semantic fit from a cosine similarity. Negative similarity counts as 0.
pub fn semantic_score(similarity: f32) -> f64 {
    if similarity.is_nan() {
        return 0.0;
    }
    f64::from(similarity).clamp(0.0, 1.0)
}

/// All structured scores for one pair, before the semantic score is known.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScores {
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
    pub location: f64,
    pub breakdown: SkillBreakdown,
}

impl FeatureScores {
    /// Scale to [0, 100] sub-scores, adding the semantic component.
    pub fn with_semantic(&self, similarity: f32) -> SubScores {
        SubScores::from_fractions(
            self.skills,
            self.experience,
            self.education,
            semantic_score(similarity),
            self.location,
        )
    }
}

pub fn score_features(candidate: &Candidate, job: &JobPosting) -> FeatureScores {
    let breakdown = compare_skills(&candidate.skills, &job.required_skills);

    FeatureScores {
        skills: breakdown.score(),
        experience: experience_score(candidate.experience_years(), job.required_years()),
        education: education_score(candidate.education_level(), job.min_education_level),
        location: location_score(job.is_remote),
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EducationEntry, ExperienceEntry};

    fn skills(items: &[&str]) -> SkillSet {
        items.iter().collect()
    }

    #[test]
    fn test_skills_exact_overlap() {
        let score = skills_score(&skills(&["Python", "AWS"]), &skills(&["Python", "Django", "AWS"]));
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_skills_empty_requirement_is_full_credit() {
        assert_eq!(skills_score(&skills(&["Rust"]), &SkillSet::new()), 1.0);
        assert_eq!(skills_score(&SkillSet::new(), &SkillSet::new()), 1.0);
    }

    #[test]
    fn test_skills_no_candidate_skills() {
        assert_eq!(skills_score(&SkillSet::new(), &skills(&["Go"])), 0.0);
    }

    #[test]
    fn test_skills_case_insensitive() {
        assert_eq!(skills_score(&skills(&["python"]), &skills(&["PYTHON"])), 1.0);
    }

    #[test]
    fn test_partial_match_half_credit() {
        let breakdown = compare_skills(
            &skills(&["PostgreSQL", "React"]),
            &skills(&["SQL", "React", "Kubernetes"]),
        );
        assert_eq!(breakdown.matched, vec!["React"]);
        assert_eq!(breakdown.partial, vec!["SQL"]);
        assert_eq!(breakdown.missing, vec!["Kubernetes"]);
        assert!((breakdown.score() - 1.5 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_counts_once_per_required_skill() {
        // "java" is inside both candidate skills but only earns one half.
        let score = skills_score(&skills(&["JavaScript", "Java EE"]), &skills(&["Java"]));
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_lists_are_disjoint_and_ordered() {
        let required = skills(&["Docker", "Go", "Terraform", "gRPC"]);
        let breakdown = compare_skills(&skills(&["go", "docker-compose"]), &required);

        assert_eq!(breakdown.matched, vec!["Go"]);
        assert_eq!(breakdown.partial, vec!["Docker"]);
        assert_eq!(breakdown.missing, vec!["Terraform", "gRPC"]);
    }

    #[test]
    fn test_experience_steps() {
        assert_eq!(experience_score(3.0, None), 1.0);
        assert_eq!(experience_score(5.0, Some(5.0)), 1.0);
        assert_eq!(experience_score(3.6, Some(5.0)), 0.8);
        assert_eq!(experience_score(2.5, Some(5.0)), 0.6);
        assert_eq!(experience_score(2.0, Some(5.0)), 0.4);
        assert_eq!(experience_score(0.0, Some(0.0)), 1.0);
        assert_eq!(experience_score(1.0, Some(f64::NAN)), 1.0);
    }

    #[test]
    fn test_education_levels() {
        use EducationLevel::*;

        assert_eq!(education_score(Some(NoDegree), None), 1.0);
        assert_eq!(education_score(None, Some(Bachelor)), 0.5);
        assert_eq!(education_score(Some(Master), Some(Bachelor)), 1.0);
        assert_eq!(education_score(Some(Bachelor), Some(Bachelor)), 1.0);
        assert_eq!(education_score(Some(Bachelor), Some(Master)), 0.7);
        assert_eq!(education_score(Some(Associate), Some(Master)), 0.5);
        assert_eq!(education_score(Some(NoDegree), Some(Associate)), 0.7);
    }

    #[test]
    fn test_location() {
        assert_eq!(location_score(true), 1.0);
        assert_eq!(location_score(false), ONSITE_LOCATION_SCORE);
    }

    #[test]
    fn test_semantic_clamps_negative() {
        assert_eq!(semantic_score(-0.4), 0.0);
        assert_eq!(semantic_score(f32::NAN), 0.0);
        assert!((semantic_score(0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_features_from_records() {
        let candidate = Candidate {
            candidate_id: "c1".into(),
            skills: skills(&["Python", "AWS"]),
            experience: vec![ExperienceEntry::default(), ExperienceEntry::default()],
            education: vec![EducationEntry {
                degree: "BSc Computer Science".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let job = JobPosting {
            job_id: "j1".into(),
            required_skills: skills(&["Python", "Django", "AWS"]),
            requirements: "At least 7+ years of backend work".into(),
            min_education_level: Some(EducationLevel::Master),
            is_remote: false,
            ..Default::default()
        };

        let features = score_features(&candidate, &job);
        assert!((features.skills - 2.0 / 3.0).abs() < 1e-9);
        // 2 roles -> 5 years against 7 required
        assert_eq!(features.experience, 0.8);
        assert_eq!(features.education, 0.7);
        assert_eq!(features.location, 0.8);

        let scores = features.with_semantic(0.42);
        assert!((scores.semantic - 42.0).abs() < 1e-4);
        assert!((scores.skills - 66.666_666).abs() < 1e-3);
    }
}
