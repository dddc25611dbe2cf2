mod matching;

use std::sync::Arc;

use crate::config::{MatchConfig, RankingWeights};
use crate::matcher::{JobMatcher, MatcherSettings};
use crate::models::{Candidate, EducationEntry, EducationLevel, ExperienceEntry, JobPosting};
use crate::semantic::{EmbeddingBackend, EmbeddingGenerator, HashEmbedder};

pub(crate) const TEST_DIMENSIONS: usize = 128;

pub(crate) fn matcher_with(backend: Arc<dyn EmbeddingBackend>, settings: MatcherSettings) -> JobMatcher {
    JobMatcher::new(EmbeddingGenerator::new(backend), settings, 2).unwrap()
}

pub(crate) fn hash_matcher() -> JobMatcher {
    matcher_with(Arc::new(HashEmbedder::new(TEST_DIMENSIONS)), MatcherSettings::default())
}

pub(crate) fn candidate(id: &str, summary: &str, skills: &[&str], roles: usize, degree: &str) -> Candidate {
    Candidate {
        candidate_id: id.to_string(),
        summary: summary.to_string(),
        skills: skills.iter().collect(),
        experience: (0..roles)
            .map(|i| ExperienceEntry {
                title: format!("Engineer {}", i + 1),
                company: "Acme".to_string(),
                ..Default::default()
            })
            .collect(),
        education: if degree.is_empty() {
            Vec::new()
        } else {
            vec![EducationEntry {
                degree: degree.to_string(),
                institution: "State University".to_string(),
                year: None,
            }]
        },
    }
}

pub(crate) fn job(id: &str, description: &str, skills: &[&str]) -> JobPosting {
    JobPosting {
        job_id: id.to_string(),
        title: "Software Engineer".to_string(),
        company: "Initech".to_string(),
        description: description.to_string(),
        required_skills: skills.iter().collect(),
        ..Default::default()
    }
}

pub(crate) fn job_with_requirements(
    id: &str,
    skills: &[&str],
    years: Option<u32>,
    education: Option<EducationLevel>,
    remote: bool,
) -> JobPosting {
    JobPosting {
        min_experience_years: years,
        min_education_level: education,
        is_remote: remote,
        ..job(id, "Build backend services", skills)
    }
}

/// Threshold 0 and a large `top_k`, so nothing is filtered out.
pub(crate) fn keep_all(weights: RankingWeights) -> MatchConfig {
    MatchConfig::new(0.0, 100, weights).unwrap()
}

pub(crate) fn skills_only() -> RankingWeights {
    RankingWeights::new(1.0, 0.0, 0.0, 0.0, 0.0).unwrap()
}
