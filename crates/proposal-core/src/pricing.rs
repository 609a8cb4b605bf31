/// Price extraction from past commercial proposals.
///
/// Only the body of the first `COMMERCIAL PROPOSAL` heading (level 1-3, any case) is
/// scanned, up to the next level 1-3 heading. Amounts are written `Rs. 1,200` or
/// `Rs 1200`; the rupee sign itself does not survive sanitization.
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::parser::list_files;
use crate::sanitize::sanitize;

static COMMERCIAL_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^#{1,3}\s*COMMERCIAL PROPOSAL\s*$").expect("valid regex")
});
static NEXT_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,3}\s+\w").expect("valid regex"));
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Rs\.?\s*([0-9,]+)").expect("valid regex"));

/// Collect prices from every `.md` file in `directory`, in file-name order.
///
/// A missing directory yields no prices.
pub fn extract_pricing(directory: &Path) -> Result<Vec<u64>, CoreError> {
    if !directory.exists() {
        return Ok(Vec::new());
    }

    let mut prices = Vec::new();
    for path in list_files(directory, &["md"])? {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable pricing source, skipping");
                continue;
            }
        };
        let text = sanitize(&String::from_utf8_lossy(&bytes));
        let found = extract_pricing_from_text(&text);
        debug!(path = %path.display(), count = found.len(), "pricing extracted");
        prices.extend(found);
    }
    Ok(prices)
}

/// The body under the first commercial-proposal heading, if the text has one.
pub fn commercial_section(text: &str) -> Option<&str> {
    let heading = COMMERCIAL_HEADING.find(text)?;
    let mut rest = &text[heading.end()..];
    if let Some(next) = COMMERCIAL_HEADING.find(rest) {
        rest = &rest[..next.start()];
    }
    if let Some(next) = NEXT_HEADING.find(rest) {
        rest = &rest[..next.start()];
    }
    Some(rest)
}

/// Parse every amount in the commercial section of `text`.
pub fn extract_pricing_from_text(text: &str) -> Vec<u64> {
    let Some(body) = commercial_section(text) else {
        return Vec::new();
    };

    AMOUNT
        .captures_iter(body)
        .filter_map(|caps| {
            let digits: String = caps[1].chars().filter(|c| *c != ',').collect();
            if digits.is_empty() {
                return None;
            }
            digits
                .parse::<u64>()
                .inspect_err(|e| warn!(amount = %&caps[0], error = %e, "unparseable price, skipping"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_in_commercial_section_only() {
        let text = "# Overview\nRs. 99\n## COMMERCIAL PROPOSAL\nRs. 1,200 and Rs. 3,000\n## Timeline\nRs. 5,000";
        assert_eq!(extract_pricing_from_text(text), vec![1200, 3000]);
    }

    #[test]
    fn test_heading_is_case_insensitive_and_amount_forms() {
        let text = "### Commercial Proposal\nLicence Rs 450000, support Rs.12,500.\n";
        assert_eq!(extract_pricing_from_text(text), vec![450000, 12500]);
    }

    #[test]
    fn test_no_heading_no_prices() {
        assert!(extract_pricing_from_text("Rs. 1,000 somewhere").is_empty());
    }

    #[test]
    fn test_level_four_heading_does_not_end_section() {
        let text = "# COMMERCIAL PROPOSAL\n#### Breakdown\nRs. 10\n# Next\nRs. 20";
        assert_eq!(extract_pricing_from_text(text), vec![10]);
    }

    #[test]
    fn test_bare_comma_is_skipped() {
        let text = "# COMMERCIAL PROPOSAL\nRs. , then Rs. 7";
        assert_eq!(extract_pricing_from_text(text), vec![7]);
    }

    #[test]
    fn test_overflowing_amount_is_skipped() {
        let text = "# COMMERCIAL PROPOSAL\nRs. 99999999999999999999999 then Rs. 8";
        assert_eq!(extract_pricing_from_text(text), vec![8]);
    }

    #[test]
    fn test_extract_pricing_scans_markdown_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.md"),
            "## COMMERCIAL PROPOSAL\nRs. 1,200 and Rs. 3,000\n## Next\nRs. 9",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.txt"), "# COMMERCIAL PROPOSAL\nRs. 77").unwrap();
        std::fs::write(dir.path().join("c.md"), "# COMMERCIAL PROPOSAL\nRs. 5").unwrap();

        assert_eq!(extract_pricing(dir.path()).unwrap(), vec![1200, 3000, 5]);
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_pricing(&dir.path().join("absent")).unwrap().is_empty());
    }
}
