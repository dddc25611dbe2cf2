use std::sync::Arc;

use super::*;
use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::models::{ConfidenceLevel, EducationLevel};

fn ids(outcome: &crate::matcher::MatchOutcome) -> Vec<&str> {
    outcome.results.iter().map(|r| r.job_id()).collect()
}

/// Two of three required skills present, no partial overlap
#[test]
fn test_skills_scenario() {
    let matcher = hash_matcher();
    let c = candidate("c1", "", &["Python", "AWS"], 0, "");
    let jobs = vec![job("j1", "Web platform", &["Python", "Django", "AWS"])];

    let outcome = matcher
        .match_candidate_to_jobs(&c, &jobs, &keep_all(skills_only()))
        .unwrap();

    let result = &outcome.results[0];
    assert!((result.skills_score() - 200.0 / 3.0).abs() < 1e-9);
    assert!((result.overall_score() - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(result.matched_skills(), &["Python".to_string(), "AWS".to_string()]);
    assert!(result.partial_skills().is_empty());
    assert_eq!(result.missing_skills(), &["Django".to_string()]);
}

/// Structured sub-scores flow through to the result unchanged
#[test]
fn test_structured_sub_scores() {
    let matcher = hash_matcher();
    // 2 roles -> 5 years against 10 required
    let c = candidate("c1", "", &["Rust"], 2, "Bachelor of Science");
    let jobs = vec![job_with_requirements(
        "j1",
        &["Rust"],
        Some(10),
        Some(EducationLevel::Master),
        false,
    )];

    let outcome = matcher
        .match_candidate_to_jobs(&c, &jobs, &keep_all(skills_only()))
        .unwrap();
    let result = &outcome.results[0];

    assert!((result.skills_score() - 100.0).abs() < 1e-9);
    assert!((result.experience_score() - 60.0).abs() < 1e-9);
    assert!((result.education_score() - 70.0).abs() < 1e-9);
    assert!((result.location_score() - 80.0).abs() < 1e-9);
    assert_eq!(result.confidence_level(), ConfidenceLevel::VeryHigh);
}

#[test]
fn test_location_remote_vs_onsite() {
    let matcher = hash_matcher();
    let c = candidate("c1", "", &[], 0, "");
    let jobs = vec![
        job_with_requirements("onsite", &[], None, None, false),
        job_with_requirements("remote", &[], None, None, true),
    ];
    let weights = RankingWeights::new(0.0, 0.0, 0.0, 0.0, 1.0).unwrap();

    let outcome = matcher.match_candidate_to_jobs(&c, &jobs, &keep_all(weights)).unwrap();

    assert_eq!(ids(&outcome), vec!["remote", "onsite"]);
    assert!((outcome.results[0].overall_score() - 100.0).abs() < 1e-9);
    assert!((outcome.results[1].overall_score() - 80.0).abs() < 1e-9);
}

/// Threshold first, then top_k over what is left
#[test]
fn test_threshold_and_top_k() {
    let matcher = hash_matcher();
    let c = candidate("c1", "", &["Rust", "Go"], 0, "");
    let jobs = vec![
        job("low", "", &["Java", "Scala", "Rust"]),
        job("high", "", &["Rust", "Go"]),
        job("mid", "", &["Rust", "Go", "Kotlin"]),
        job("extra", "", &["Rust", "Go"]),
    ];

    let config = MatchConfig::new(50.0, 2, skills_only()).unwrap();
    let outcome = matcher.match_candidate_to_jobs(&c, &jobs, &config).unwrap();
    assert_eq!(ids(&outcome), vec!["extra", "high"]);

    let config = MatchConfig::new(50.0, 10, skills_only()).unwrap();
    let outcome = matcher.match_candidate_to_jobs(&c, &jobs, &config).unwrap();
    assert_eq!(ids(&outcome), vec!["extra", "high", "mid"]);
    assert!(outcome.results.iter().all(|r| r.overall_score() >= 50.0));
}

#[test]
fn test_results_sorted_with_skills_tie_break() {
    let matcher = hash_matcher();
    // 2 roles -> 5 years
    let c = candidate("c1", "", &["Rust"], 2, "");
    let weights = RankingWeights::new(0.5, 0.5, 0.0, 0.0, 0.0).unwrap();
    let jobs = vec![
        // skills 50, experience 100 -> 75
        job_with_requirements("b", &["Rust", "Haskell"], Some(5), None, false),
        // skills 100, 5 of 10 years gives experience 60 -> 80
        job_with_requirements("a", &["Rust"], Some(10), None, false),
        // skills 100, experience 100 -> 100
        job_with_requirements("c", &["Rust"], Some(1), None, false),
        // skills 50, experience 100 -> 75, same as "b"
        job_with_requirements("d", &["Rust", "Elixir"], Some(3), None, false),
    ];

    let outcome = matcher.match_candidate_to_jobs(&c, &jobs, &keep_all(weights)).unwrap();

    assert_eq!(ids(&outcome), vec!["c", "a", "b", "d"]);
    for pair in outcome.results.windows(2) {
        assert!(pair[0].overall_score() >= pair[1].overall_score());
        if pair[0].overall_score() == pair[1].overall_score() {
            assert!(pair[0].skills_score() >= pair[1].skills_score());
        }
    }
}

/// Every score stays inside [0, 100]
#[test]
fn test_scores_bounded() {
    let matcher = hash_matcher();
    let c = candidate(
        "c1",
        "Distributed systems engineer with Rust, Kafka and Postgres",
        &["Rust", "Kafka", "SQL"],
        3,
        "PhD in Computer Science",
    );
    let jobs = vec![
        job("j1", "Kafka streaming platform", &["Kafka", "PostgreSQL"]),
        job("j2", "", &[]),
        job_with_requirements("j3", &["Java"], Some(20), Some(EducationLevel::Doctorate), true),
    ];

    let outcome = matcher
        .match_candidate_to_jobs(&c, &jobs, &keep_all(RankingWeights::default()))
        .unwrap();

    assert_eq!(outcome.results.len(), 3);
    for r in &outcome.results {
        for score in [
            r.overall_score(),
            r.skills_score(),
            r.experience_score(),
            r.education_score(),
            r.semantic_score(),
            r.location_score(),
        ] {
            assert!((0.0..=100.0).contains(&score), "score {} out of range", score);
        }
    }

    // No required skills means full skill credit
    let j2 = outcome.results.iter().find(|r| r.job_id() == "j2").unwrap();
    assert!((j2.skills_score() - 100.0).abs() < 1e-9);
}

#[test]
fn test_semantic_prefers_related_text() {
    let matcher = hash_matcher();
    let c = candidate(
        "c1",
        "rust developer building async network services with tokio and grpc",
        &[],
        0,
        "",
    );
    let jobs = vec![
        job("bakery", "pastry chef baking bread croissants and cakes every morning", &[]),
        job("rust", "rust developer building async network services with tokio and grpc", &[]),
    ];
    let weights = RankingWeights::new(0.0, 0.0, 0.0, 1.0, 0.0).unwrap();

    let outcome = matcher.match_candidate_to_jobs(&c, &jobs, &keep_all(weights)).unwrap();

    assert_eq!(ids(&outcome), vec!["rust", "bakery"]);
    assert!(outcome.results[0].semantic_score() > outcome.results[1].semantic_score());
}

#[test]
fn test_idempotent() {
    let matcher = hash_matcher();
    let c = candidate("c1", "Backend developer", &["Python", "SQL"], 2, "Master of Science");
    let jobs: Vec<_> = (0..12)
        .map(|i| job(&format!("j{:02}", i), &format!("Role number {}", i % 4), &["Python", "SQL", "Go"][..(i % 3) + 1]))
        .collect();
    let config = keep_all(RankingWeights::default());

    let first = matcher.match_candidate_to_jobs(&c, &jobs, &config).unwrap();
    let second = matcher.match_candidate_to_jobs(&c, &jobs, &config).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_no_jobs_is_not_an_error() {
    let matcher = hash_matcher();
    let c = candidate("c1", "anything", &["Rust"], 1, "");

    let outcome = matcher
        .match_candidate_to_jobs(&c, &[], &MatchConfig::default())
        .unwrap();

    assert!(outcome.results.is_empty());
    assert!(outcome.skipped.is_empty());
}

/// Malformed jobs are skipped, the rest are still ranked
#[test]
fn test_bad_jobs_skipped() {
    let matcher = hash_matcher();
    let c = candidate("c1", "", &["Rust"], 0, "");
    let jobs = vec![
        job("j1", "first", &["Rust"]),
        job("   ", "no id", &["Rust"]),
        job("j1", "repeated id", &["Rust"]),
        job("j2", "second", &["Rust"]),
    ];

    let outcome = matcher
        .match_candidate_to_jobs(&c, &jobs, &keep_all(skills_only()))
        .unwrap();

    assert_eq!(ids(&outcome), vec!["j1", "j2"]);
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.skipped[0].id, "   ");
    assert_eq!(outcome.skipped[1].id, "j1");
    assert!(outcome.skipped[1].reason.contains("duplicate"));
}

#[test]
fn test_match_job_to_candidates() {
    let matcher = hash_matcher();
    let posting = job("j1", "Data engineering", &["Python", "Spark"]);
    let candidates = vec![
        candidate("weak", "", &["Excel"], 0, ""),
        candidate("strong", "", &["Python", "Spark"], 0, ""),
        candidate("partial", "", &["Python"], 0, ""),
        candidate("strong", "", &["Python"], 0, ""),
        candidate("", "", &["Python", "Spark"], 0, ""),
    ];

    let outcome = matcher
        .match_job_to_candidates(&posting, &candidates, &keep_all(skills_only()))
        .unwrap();

    let ranked: Vec<&str> = outcome.results.iter().map(|r| r.candidate_id()).collect();
    assert_eq!(ranked, vec!["strong", "partial", "weak"]);
    assert!(outcome.results.iter().all(|r| r.job_id() == "j1"));
    assert_eq!(outcome.skipped.len(), 2);
}

#[test]
fn test_match_job_without_id_rejected() {
    let matcher = hash_matcher();
    let posting = job("", "nameless", &[]);
    let candidates = vec![candidate("c1", "", &[], 0, "")];

    let err = matcher
        .match_job_to_candidates(&posting, &candidates, &MatchConfig::default())
        .unwrap_err();
    assert!(matches!(err, MatchError::Configuration(_)));
}

#[test]
fn test_find_similar_jobs() {
    let matcher = hash_matcher();
    let target = job("target", "rust compiler engineer working on borrow checking and type inference", &[]);
    let pool = vec![
        target.clone(),
        job("unrelated", "forklift operator for a busy warehouse night shift", &[]),
        job("twin", "rust compiler engineer working on borrow checking and type inference", &[]),
        job("close", "rust compiler engineer working on code generation", &[]),
    ];

    let similar = matcher.find_similar_jobs(&target, &pool, 2).unwrap();

    let ids: Vec<&str> = similar.iter().map(|(j, _)| j.job_id.as_str()).collect();
    assert_eq!(ids, vec!["twin", "close"]);
    assert!((similar[0].1 - 100.0).abs() < 1e-3);
    assert!(similar.iter().all(|(_, s)| (0.0..=100.0).contains(s)));
    assert!(similar[0].1 >= similar[1].1);
}

#[test]
fn test_find_similar_jobs_edge_cases() {
    let matcher = hash_matcher();
    let target = job("target", "anything", &[]);

    let err = matcher.find_similar_jobs(&target, &[], 0).unwrap_err();
    assert!(matches!(err, MatchError::Configuration(_)));

    let only_self = vec![target.clone()];
    assert!(matcher.find_similar_jobs(&target, &only_self, 5).unwrap().is_empty());
}

/// One matcher shared across threads gives the same answers as sequential calls
#[test]
fn test_concurrent_calls() {
    let matcher = Arc::new(hash_matcher());
    let jobs: Arc<Vec<_>> = Arc::new(
        (0..20)
            .map(|i| job(&format!("job-{}", i), &format!("team {} services", i), &["Rust", "SQL"][..(i % 2) + 1]))
            .collect(),
    );
    let config = keep_all(RankingWeights::default());

    let candidates: Vec<_> = (0..4)
        .map(|i| candidate(&format!("c{}", i), &format!("engineer {}", i), &["Rust"], i, ""))
        .collect();
    let expected: Vec<_> = candidates
        .iter()
        .map(|c| matcher.match_candidate_to_jobs(c, &jobs, &config).unwrap())
        .collect();

    let handles: Vec<_> = candidates
        .into_iter()
        .map(|c| {
            let matcher = Arc::clone(&matcher);
            let jobs = Arc::clone(&jobs);
            let config = config.clone();
            std::thread::spawn(move || matcher.match_candidate_to_jobs(&c, &jobs, &config).unwrap())
        })
        .collect();

    for (handle, expected) in handles.into_iter().zip(expected) {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
