//! Text preparation for embedding generation.
//!
//! Candidates and postings are flattened into labelled sections
//! ("Summary: ...", "Title: ...") so both sides share vocabulary cues.
//! Empty sections are left out; a record with no text at all yields an
//! empty string, which encodes to the zero vector.

use crate::models::{Candidate, JobPosting};

/// Maximum content length for embedding input (characters, not tokens)
const MAX_CONTENT_LENGTH: usize = 8000;

/// Flatten a candidate into embedding input.
pub fn candidate_text(candidate: &Candidate) -> String {
    let mut parts = Vec::new();

    push_section(&mut parts, "Summary", candidate.summary.trim());

    if !candidate.skills.is_empty() {
        let skills = candidate.skills.iter().collect::<Vec<_>>().join(", ");
        push_section(&mut parts, "Skills", &skills);
    }

    let experience: Vec<String> = candidate
        .experience
        .iter()
        .filter_map(|e| {
            let role = join_with(e.title.trim(), " at ", e.company.trim());
            let entry = join_with(&role, ". ", e.description.trim());
            (!entry.is_empty()).then_some(entry)
        })
        .collect();
    push_section(&mut parts, "Experience", &experience.join(" "));

    let education: Vec<String> = candidate
        .education
        .iter()
        .filter_map(|e| {
            let entry = join_with(e.degree.trim(), " from ", e.institution.trim());
            (!entry.is_empty()).then_some(entry)
        })
        .collect();
    push_section(&mut parts, "Education", &education.join(" "));

    truncate_content(&parts.join(" "))
}

/// Flatten a job posting into embedding input.
pub fn job_text(job: &JobPosting) -> String {
    let mut parts = Vec::new();

    push_section(&mut parts, "Title", job.title.trim());
    push_section(&mut parts, "Company", job.company.trim());
    push_section(&mut parts, "Description", job.description.trim());

    if !job.required_skills.is_empty() {
        let skills = job.required_skills.iter().collect::<Vec<_>>().join(", ");
        push_section(&mut parts, "Required Skills", &skills);
    }

    push_section(&mut parts, "Requirements", job.requirements.trim());

    truncate_content(&parts.join(" "))
}

fn push_section(parts: &mut Vec<String>, label: &str, body: &str) {
    if !body.is_empty() {
        parts.push(format!("{}: {}", label, body));
    }
}

/// `left + sep + right`, dropping the separator when either side is empty.
fn join_with(left: &str, sep: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (false, false) => format!("{}{}{}", left, sep, right),
        (false, true) => left.to_string(),
        (true, false) => right.to_string(),
        (true, true) => String::new(),
    }
}

/// Truncate content to MAX_CONTENT_LENGTH characters.
fn truncate_content(content: &str) -> String {
    match content.char_indices().nth(MAX_CONTENT_LENGTH) {
        Some((byte_idx, _)) => content[..byte_idx].to_string(),
        None => content.to_string(),
    }
}
