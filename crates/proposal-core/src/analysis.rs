/// Structured extraction from LLM-written RFP and vendor analyses, plus proposal checks.
///
/// RFP analyses are requested with fixed upper-case block headings (`KEY REQUIREMENTS`,
/// `DELIVERABLES`, `REQUIRED SECTIONS`, `TIMELINE`, `EVALUATION CRITERIA`,
/// `CLIENT PAIN POINTS`). A block starts right after the first occurrence of its heading
/// and ends at an explicit closing heading or at the next blank line. A heading that does
/// not occur yields an empty block.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sanitize::sanitize;

static WEIGHTED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(?:\s+\((\d+)%\))?$").expect("valid regex"));
static MATCH_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)match\s*score\s*:\s*(\d+)").expect("valid regex"));

const DEFAULT_WEIGHTED_CRITERIA: &[(&str, u32)] = &[
    ("Requirement Match", 40),
    ("Compliance", 25),
    ("Quality", 20),
    ("Alignment", 15),
];

const DEADLINE_TERMS: &[&str] = &["deadline", "date", "due"];

const GENERIC_PHRASES: &[&str] = &[
    "our clients",
    "many organizations",
    "typical companies",
    "best practices",
    "industry standards",
    "our approach",
    "our methodology",
    "our process",
    "our solution",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedCriterion {
    pub criterion: String,
    /// Percentage weight; 100 when the line carries none.
    pub weight: u32,
}

/// Everything extracted from one RFP analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfpAnalysis {
    pub mandatory_criteria: Vec<String>,
    pub weighted_criteria: Vec<WeightedCriterion>,
    pub deadlines: Vec<String>,
    pub deliverables: Vec<String>,
    pub required_sections: Vec<String>,
}

impl RfpAnalysis {
    pub fn extract(analysis_text: &str) -> Self {
        Self {
            mandatory_criteria: extract_mandatory_criteria(analysis_text),
            weighted_criteria: extract_weighted_criteria(analysis_text),
            deadlines: extract_deadlines(analysis_text),
            deliverables: extract_deliverables(analysis_text),
            required_sections: extract_required_sections(analysis_text),
        }
    }
}

enum BlockEnd<'m> {
    Heading(&'m str),
    BlankLine,
}

/// Body of the block opened by `heading`, trimmed.
///
/// Whatever follows the heading on its own line (typically `:`) is dropped unless it
/// contains text. A missing closing heading runs the block to the end of the input.
fn block<'a>(text: &'a str, heading: &str, end: BlockEnd<'_>) -> Option<&'a str> {
    let start = text.find(heading)? + heading.len();
    let rest = &text[start..];
    let stop = match end {
        BlockEnd::Heading(closing) => rest.find(closing),
        BlockEnd::BlankLine => rest.find("\n\n"),
    }
    .unwrap_or(rest.len());
    let mut body = &rest[..stop];

    let first_line = body.split('\n').next().unwrap_or("");
    if !first_line.chars().any(char::is_alphanumeric) {
        body = &body[first_line.len()..];
    }
    Some(body.trim())
}

fn block_lines<'a>(text: &'a str, heading: &str, end: BlockEnd<'_>) -> Vec<&'a str> {
    block(text, heading, end)
        .map(|body| body.split('\n').map(str::trim).filter(|l| !l.is_empty()).collect())
        .unwrap_or_default()
}

/// `KEY REQUIREMENTS` lines (up to `DELIVERABLES`) that mention "must" or "required".
pub fn extract_mandatory_criteria(analysis_text: &str) -> Vec<String> {
    let text = sanitize(analysis_text);
    block_lines(&text, "KEY REQUIREMENTS", BlockEnd::Heading("DELIVERABLES"))
        .into_iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("must") || lower.contains("required")
        })
        .map(str::to_string)
        .collect()
}

/// `EVALUATION CRITERIA` lines (up to `CLIENT PAIN POINTS`) as `Name (NN%)` pairs.
///
/// Falls back to the standard four criteria when the block is missing or empty.
pub fn extract_weighted_criteria(analysis_text: &str) -> Vec<WeightedCriterion> {
    let text = sanitize(analysis_text);
    let criteria: Vec<WeightedCriterion> =
        block_lines(&text, "EVALUATION CRITERIA", BlockEnd::Heading("CLIENT PAIN POINTS"))
            .into_iter()
            .filter_map(|line| {
                let caps = WEIGHTED_LINE.captures(line)?;
                let criterion = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
                let weight = match caps.get(2) {
                    Some(m) => m
                        .as_str()
                        .parse::<u32>()
                        .inspect_err(|e| warn!(line, error = %e, "unparseable criterion weight, using 100"))
                        .unwrap_or(100),
                    None => 100,
                };
                Some(WeightedCriterion { criterion, weight })
            })
            .collect();

    if criteria.is_empty() {
        return DEFAULT_WEIGHTED_CRITERIA
            .iter()
            .map(|(criterion, weight)| WeightedCriterion {
                criterion: criterion.to_string(),
                weight: *weight,
            })
            .collect();
    }
    criteria
}

/// `TIMELINE` lines that mention a deadline, date or due date.
pub fn extract_deadlines(analysis_text: &str) -> Vec<String> {
    let text = sanitize(analysis_text);
    block_lines(&text, "TIMELINE", BlockEnd::BlankLine)
        .into_iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            DEADLINE_TERMS.iter().any(|term| lower.contains(term))
        })
        .map(str::to_string)
        .collect()
}

pub fn extract_deliverables(analysis_text: &str) -> Vec<String> {
    let text = sanitize(analysis_text);
    block_lines(&text, "DELIVERABLES", BlockEnd::BlankLine)
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn extract_required_sections(analysis_text: &str) -> Vec<String> {
    let text = sanitize(analysis_text);
    block_lines(&text, "REQUIRED SECTIONS", BlockEnd::BlankLine)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Flag drafted sections that read as boilerplate rather than written for `client_name`.
///
/// A section needs at least `max(3, chars / 500)` case-insensitive mentions of the
/// client; an empty client name disables that check. Each generic phrase present is
/// flagged once per section.
pub fn validate_client_specificity<S: AsRef<str>>(
    sections: &[(S, S)],
    client_name: &str,
) -> Vec<String> {
    let client = sanitize(client_name).to_lowercase();
    let mut issues = Vec::new();

    for (name, content) in sections {
        let name = sanitize(name.as_ref());
        let content = sanitize(content.as_ref()).to_lowercase();

        if !client.is_empty() {
            let found = content.matches(client.as_str()).count();
            let expected = (content.chars().count() / 500).max(3);
            if found < expected {
                issues.push(format!(
                    "Section '{name}' has insufficient client references ({found} found, {expected} expected)"
                ));
            }
        }

        for phrase in GENERIC_PHRASES {
            if content.contains(phrase) {
                issues.push(format!("Section '{name}' contains generic phrase: '{phrase}'"));
            }
        }
    }
    issues
}

/// Statistics over the `Match Score: NN` values of several vendor analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScoreSummary {
    pub scores: Vec<u32>,
    pub average: f64,
    pub max: u32,
    pub min: u32,
}

/// `None` when no analysis reports a match score.
pub fn summarize_match_scores<S: AsRef<str>>(analyses: &[S]) -> Option<MatchScoreSummary> {
    let scores: Vec<u32> = analyses
        .iter()
        .filter_map(|analysis| {
            let text = sanitize(analysis.as_ref());
            let caps = MATCH_SCORE.captures(&text)?;
            caps[1]
                .parse::<u32>()
                .inspect_err(|e| warn!(score = &caps[1], error = %e, "unparseable match score, skipping"))
                .ok()
        })
        .collect();

    let max = *scores.iter().max()?;
    let min = *scores.iter().min()?;
    let average = scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64;
    Some(MatchScoreSummary {
        scores,
        average,
        max,
        min,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = "\
1. KEY REQUIREMENTS:
- The system must support 500 concurrent users
- Nice to have: dark mode
- SSO integration is required

2. DELIVERABLES:
- Deployed platform
- Training material

3. REQUIRED SECTIONS:
Executive Summary
Technical Approach

4. TIMELINE:
- Proposal due 15 March
- Kick-off in April
- Go-live date: 1 July

6. EVALUATION CRITERIA:
Technical fit (40%)
Price (35%)
References

CLIENT PAIN POINTS:
- legacy system outages
";

    #[test]
    fn test_mandatory_criteria() {
        assert_eq!(
            extract_mandatory_criteria(ANALYSIS),
            vec![
                "- The system must support 500 concurrent users",
                "- SSO integration is required",
            ]
        );
    }

    #[test]
    fn test_weighted_criteria() {
        let criteria = extract_weighted_criteria(ANALYSIS);
        assert_eq!(
            criteria,
            vec![
                WeightedCriterion { criterion: "Technical fit".into(), weight: 40 },
                WeightedCriterion { criterion: "Price".into(), weight: 35 },
                WeightedCriterion { criterion: "References".into(), weight: 100 },
            ]
        );
    }

    #[test]
    fn test_weighted_criteria_defaults() {
        let criteria = extract_weighted_criteria("no criteria here");
        assert_eq!(criteria.len(), 4);
        assert_eq!(criteria[0].criterion, "Requirement Match");
        assert_eq!(criteria.iter().map(|c| c.weight).sum::<u32>(), 100);
    }

    #[test]
    fn test_blank_line_terminated_blocks() {
        assert_eq!(
            extract_deliverables(ANALYSIS),
            vec!["- Deployed platform", "- Training material"]
        );
        assert_eq!(
            extract_required_sections(ANALYSIS),
            vec!["Executive Summary", "Technical Approach"]
        );
        assert_eq!(
            extract_deadlines(ANALYSIS),
            vec!["- Proposal due 15 March", "- Go-live date: 1 July"]
        );
    }

    #[test]
    fn test_missing_headings_yield_nothing() {
        let analysis = RfpAnalysis::extract("free text without structure");
        assert!(analysis.mandatory_criteria.is_empty());
        assert!(analysis.deadlines.is_empty());
        assert!(analysis.deliverables.is_empty());
        assert!(analysis.required_sections.is_empty());
        assert_eq!(analysis.weighted_criteria.len(), 4);
    }

    #[test]
    fn test_unterminated_block_runs_to_end() {
        assert_eq!(
            extract_mandatory_criteria("KEY REQUIREMENTS\nAll data must stay in region"),
            vec!["All data must stay in region"]
        );
    }

    #[test]
    fn test_client_specificity() {
        let sections = vec![
            ("Summary", "Acme needs a platform. ACME will benefit. acme grows."),
            ("Approach", "Our methodology follows best practices for Acme."),
        ];
        let issues = validate_client_specificity(&sections, "Acme");
        assert_eq!(
            issues,
            vec![
                "Section 'Approach' has insufficient client references (1 found, 3 expected)",
                "Section 'Approach' contains generic phrase: 'best practices'",
                "Section 'Approach' contains generic phrase: 'our methodology'",
            ]
        );
    }

    #[test]
    fn test_client_specificity_scales_with_length() {
        let content = format!("{} Acme Acme Acme", "x".repeat(2000));
        let issues = validate_client_specificity(&[("Long", content.as_str())], "Acme");
        assert_eq!(
            issues,
            vec!["Section 'Long' has insufficient client references (3 found, 4 expected)"]
        );
        assert!(validate_client_specificity(&[("Long", content.as_str())], "").is_empty());
    }

    #[test]
    fn test_summarize_match_scores() {
        let summary = summarize_match_scores(&[
            "Overall Match Score: 80",
            "no score",
            "match score:60 and Match Score: 99",
        ])
        .unwrap();
        assert_eq!(summary.scores, vec![80, 60]);
        assert_eq!(summary.max, 80);
        assert_eq!(summary.min, 60);
        assert!((summary.average - 70.0).abs() < 1e-9);
        assert!(summarize_match_scores(&["nothing"]).is_none());
    }

    #[test]
    fn test_overflowing_numbers_are_not_dropped_silently() {
        let summary =
            summarize_match_scores(&["Match Score: 99999999999", "Match Score: 40"]).unwrap();
        assert_eq!(summary.scores, vec![40]);

        let text = "EVALUATION CRITERIA\nCost (99999999999%)\nCLIENT PAIN POINTS";
        let criteria = extract_weighted_criteria(text);
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].criterion, "Cost");
        assert_eq!(criteria[0].weight, 100);
    }
}
