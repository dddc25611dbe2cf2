//! Weighted ranking of scored pairs.
//!
//! Ranking is pure: the same pairs and weights always produce the same
//! ordered output, so there is nothing to retry.

use std::cmp::Ordering;

use crate::config::{MatchConfig, RankingWeights};
use crate::models::{MatchResult, SubScores};
use crate::scoring::SkillBreakdown;

/// Sub-scores of one candidate/job pair, ready to be ranked.
#[derive(Debug, Clone, PartialEq)]
pub struct PairScores {
    pub candidate_id: String,
    pub job_id: String,
    pub scores: SubScores,
    pub skills: SkillBreakdown,
}

/// Combine, label and sort pairs.
///
/// Order: overall score descending, then skills score descending, then
/// `job_id` ascending, then `candidate_id` ascending.
pub fn rank(pairs: Vec<PairScores>, weights: &RankingWeights) -> Vec<MatchResult> {
    let mut results: Vec<MatchResult> = pairs
        .into_iter()
        .map(|pair| {
            let overall = weights.combine(&pair.scores);
            MatchResult::new(
                pair.candidate_id,
                pair.job_id,
                overall,
                pair.scores,
                pair.skills.matched,
                pair.skills.partial,
                pair.skills.missing,
            )
        })
        .collect();

    results.sort_by(compare_results);
    results
}

/// Drop results below `threshold`, then keep the first `top_k`.
pub fn select(ranked: Vec<MatchResult>, threshold: f64, top_k: usize) -> Vec<MatchResult> {
    ranked
        .into_iter()
        .filter(|r| r.overall_score() >= threshold)
        .take(top_k)
        .collect()
}

/// `rank` followed by `select` with the thresholds from `config`.
pub fn rank_and_select(pairs: Vec<PairScores>, config: &MatchConfig) -> Vec<MatchResult> {
    let total = pairs.len();
    let ranked = rank(pairs, config.weights());
    let selected = select(ranked, config.similarity_threshold(), config.top_k());

    log::info!(
        "ranked {} pairs, {} kept (threshold {}, top_k {})",
        total,
        selected.len(),
        config.similarity_threshold(),
        config.top_k()
    );

    selected
}

pub(crate) fn compare_results(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.overall_score()
        .total_cmp(&a.overall_score())
        .then_with(|| b.skills_score().total_cmp(&a.skills_score()))
        .then_with(|| a.job_id().cmp(b.job_id()))
        .then_with(|| a.candidate_id().cmp(b.candidate_id()))
}

/// A single score column results can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Overall,
    Skills,
    Experience,
    Education,
    Semantic,
    Location,
}

impl Component {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "overall" => Some(Component::Overall),
            "skills" => Some(Component::Skills),
            "experience" => Some(Component::Experience),
            "education" => Some(Component::Education),
            "semantic" => Some(Component::Semantic),
            "location" => Some(Component::Location),
            _ => None,
        }
    }

    pub fn score(self, result: &MatchResult) -> f64 {
        match self {
            Component::Overall => result.overall_score(),
            Component::Skills => result.skills_score(),
            Component::Experience => result.experience_score(),
            Component::Education => result.education_score(),
            Component::Semantic => result.semantic_score(),
            Component::Location => result.location_score(),
        }
    }
}

/// Re-sort results by one component, descending. Ties fall back to the
/// normal ranking order.
pub fn rank_by_component(mut results: Vec<MatchResult>, component: Component) -> Vec<MatchResult> {
    results.sort_by(|a, b| {
        component
            .score(b)
            .total_cmp(&component.score(a))
            .then_with(|| compare_results(a, b))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(job_id: &str, skills: f64, experience: f64, education: f64, semantic: f64) -> PairScores {
        PairScores {
            candidate_id: "c1".to_string(),
            job_id: job_id.to_string(),
            scores: SubScores {
                skills,
                experience,
                education,
                semantic,
                location: 80.0,
            },
            skills: SkillBreakdown::default(),
        }
    }

    fn weights() -> RankingWeights {
        RankingWeights::new(0.5, 0.3, 0.1, 0.1, 0.0).unwrap()
    }

    fn ids(results: &[MatchResult]) -> Vec<&str> {
        results.iter().map(|r| r.job_id()).collect()
    }

    #[test]
    fn test_weighted_overall() {
        let ranked = rank(vec![pair("j1", 80.0, 60.0, 100.0, 50.0)], &weights());
        assert!((ranked[0].overall_score() - 73.0).abs() < 1e-9);
    }

    #[test]
    fn test_sorted_descending() {
        let ranked = rank(
            vec![
                pair("low", 10.0, 10.0, 10.0, 10.0),
                pair("high", 90.0, 90.0, 90.0, 90.0),
                pair("mid", 50.0, 50.0, 50.0, 50.0),
            ],
            &weights(),
        );
        assert_eq!(ids(&ranked), vec!["high", "mid", "low"]);
        assert!(ranked
            .windows(2)
            .all(|w| w[0].overall_score() >= w[1].overall_score()));
    }

    #[test]
    fn test_ties_prefer_skills_then_job_id() {
        let w = RankingWeights::new(0.5, 0.5, 0.0, 0.0, 0.0).unwrap();
        let ranked = rank(
            vec![
                pair("b", 60.0, 80.0, 0.0, 0.0),
                pair("a", 60.0, 80.0, 0.0, 0.0),
                pair("c", 80.0, 60.0, 0.0, 0.0),
            ],
            &w,
        );
        assert!(ranked.iter().all(|r| (r.overall_score() - 70.0).abs() < 1e-9));
        assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_threshold_then_top_k() {
        let w = RankingWeights::new(1.0, 0.0, 0.0, 0.0, 0.0).unwrap();
        let ranked = rank(
            vec![
                pair("a", 90.0, 0.0, 0.0, 0.0),
                pair("b", 73.0, 0.0, 0.0, 0.0),
                pair("c", 40.0, 0.0, 0.0, 0.0),
            ],
            &w,
        );

        let selected = select(ranked.clone(), 50.0, 2);
        assert_eq!(ids(&selected), vec!["a", "b"]);

        // Threshold is inclusive.
        assert_eq!(select(ranked.clone(), 73.0, 10).len(), 2);
        assert_eq!(select(ranked, 95.0, 10).len(), 0);
    }

    #[test]
    fn test_confidence_assigned() {
        use crate::models::ConfidenceLevel;

        let w = RankingWeights::new(1.0, 0.0, 0.0, 0.0, 0.0).unwrap();
        let ranked = rank(vec![pair("a", 85.0, 0.0, 0.0, 0.0), pair("b", 59.0, 0.0, 0.0, 0.0)], &w);
        assert_eq!(ranked[0].confidence_level(), ConfidenceLevel::VeryHigh);
        assert_eq!(ranked[1].confidence_level(), ConfidenceLevel::Low);
    }

    #[test]
    fn test_rank_by_component() {
        let ranked = rank(
            vec![
                pair("a", 90.0, 20.0, 50.0, 10.0),
                pair("b", 40.0, 95.0, 50.0, 10.0),
                pair("c", 60.0, 95.0, 50.0, 10.0),
            ],
            &weights(),
        );

        let by_experience = rank_by_component(ranked.clone(), Component::Experience);
        assert_eq!(ids(&by_experience), vec!["c", "b", "a"]);

        let by_skills = rank_by_component(ranked, Component::Skills);
        assert_eq!(ids(&by_skills), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_component_parse() {
        assert_eq!(Component::parse("Semantic"), Some(Component::Semantic));
        assert_eq!(Component::parse("salary"), None);
    }

    #[test]
    fn test_skill_lists_carried_through() {
        let mut p = pair("a", 50.0, 0.0, 0.0, 0.0);
        p.skills = SkillBreakdown {
            matched: vec!["Rust".into()],
            partial: vec!["SQL".into()],
            missing: vec!["Go".into()],
        };
        let ranked = rank(vec![p], &weights());
        assert_eq!(ranked[0].matched_skills(), &["Rust".to_string()]);
        assert_eq!(ranked[0].partial_skills(), &["SQL".to_string()]);
        assert_eq!(ranked[0].missing_skills(), &["Go".to_string()]);
    }
}
