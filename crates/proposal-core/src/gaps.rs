/// Coverage gaps and risk flags for a candidate proposal against a requirements text.
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::GapReport;
use crate::sanitize::sanitize;
use crate::tfidf::{cosine_similarity, TfidfModel};

/// Below this similarity the candidate is reported as under-covering the requirements.
pub const LOW_COVERAGE_THRESHOLD: f64 = 0.7;
/// Below this similarity the candidate is also reported as mismatched and high risk.
pub const MISMATCH_THRESHOLD: f64 = 0.5;

const RISK_PHRASES: &[&str] = &[
    "unable to",
    "cannot commit",
    "significant challenge",
    "out of scope",
    "additional cost",
    "dependency on client",
];

static RISK_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    RISK_PHRASES
        .iter()
        .map(|phrase| {
            let re = Regex::new(&format!(r"\b{}\b", regex::escape(phrase))).expect("valid regex");
            (*phrase, re)
        })
        .collect()
});

/// Compare `candidate` with `requirements`.
///
/// Similarity is the TF-IDF cosine of the two texts fitted jointly as a two-document
/// corpus. When neither text contains a single term nothing can be compared and the
/// report is empty.
pub fn identify_gaps_and_risks(candidate: &str, requirements: &str) -> GapReport {
    let candidate = sanitize(candidate);
    let requirements = sanitize(requirements);

    let Some((_, vectors)) = TfidfModel::fit_transform(&[requirements.as_str(), candidate.as_str()])
    else {
        debug!("no terms in either text, skipping gap analysis");
        return GapReport::default();
    };
    let similarity = cosine_similarity(&vectors[0], &vectors[1]);

    let mut gaps = Vec::new();
    if similarity < LOW_COVERAGE_THRESHOLD {
        gaps.push(format!(
            "Potential low coverage of key requirements (Similarity Score: {similarity:.2})"
        ));
    }
    if similarity < MISMATCH_THRESHOLD {
        gaps.push("Potential mismatch in proposed solutions compared to requirements".to_string());
    }

    let lowered = candidate.to_lowercase();
    let mut risks: Vec<String> = RISK_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&lowered))
        .map(|(phrase, _)| format!("Potential risk identified related to keyword: '{phrase}'"))
        .collect();
    if similarity < MISMATCH_THRESHOLD {
        risks.push("High risk of non-compliance due to low overall similarity".to_string());
    }

    debug!(similarity, gaps = gaps.len(), risks = risks.len(), "gap analysis complete");
    GapReport {
        similarity: Some(similarity),
        gaps: gaps.iter().map(|g| sanitize(g)).collect(),
        risks: risks.iter().map(|r| sanitize(r)).collect(),
    }
}
