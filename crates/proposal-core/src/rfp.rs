/// Splits extracted RFP text into titled sections.
///
/// Unlike the knowledge-base files, RFPs arrive as plain text recovered from PDF or DOCX,
/// so headings are recognised by shape rather than markdown markers. A trimmed line is a
/// heading when it is one of:
/// - an optionally numbered title: `2.1. Scope Of Work`
/// - an all-caps title with an optional trailing `:` or `.`: `EVALUATION CRITERIA:`
/// - a `Section N: Title` line
use std::sync::LazyLock;

use regex::Regex;

use crate::sanitize::sanitize;

const DEFAULT_SECTION: &str = "Overview";

static HEADING_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"^(?:\d+\.)?(?:\d+\.)?(?:\d+\.)?\s*([A-Z][A-Za-z\s]+)$").expect("valid regex"),
        Regex::new(r"^([A-Z][A-Z\s]+)(?:\:|\.)?\s*$").expect("valid regex"),
        Regex::new(r"^(?:Section|SECTION)\s+\d+\s*[\:\-\.]\s*([A-Za-z\s]+)$").expect("valid regex"),
    ]
});

/// Heading title of `line`, if it is a heading.
fn heading_title(line: &str) -> Option<String> {
    let line = line.trim();
    HEADING_PATTERNS
        .iter()
        .find_map(|re| re.captures(line))
        .map(|caps| caps[1].trim().to_string())
}

/// `(title, body)` pairs in first-seen order.
///
/// Text before the first heading belongs to "Overview". A heading with no body lines
/// before the next heading is dropped, and a repeated title replaces the earlier body.
pub fn split_rfp_sections(rfp_text: &str) -> Vec<(String, String)> {
    let text = sanitize(rfp_text);
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current = DEFAULT_SECTION.to_string();
    let mut lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        match heading_title(line) {
            Some(title) => {
                flush(&mut sections, &current, &mut lines);
                current = title;
            }
            None => lines.push(line),
        }
    }
    flush(&mut sections, &current, &mut lines);
    sections
}

fn flush(sections: &mut Vec<(String, String)>, name: &str, lines: &mut Vec<&str>) {
    if lines.is_empty() {
        return;
    }
    let body = lines.join("\n");
    lines.clear();
    match sections.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, existing_body)) => *existing_body = body,
        None => sections.push((name.to_string(), body)),
    }
}
