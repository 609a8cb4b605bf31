/// Canonical term and its synonyms. Order is significant for output stability.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("proposal", &["offer", "bid", "solution"]),
    ("requirements", &["needs", "specifications", "criteria"]),
    ("implementation", &["deployment", "execution", "rollout"]),
    ("support", &["maintenance", "service", "assistance"]),
];

/// Expand `query` with domain synonyms.
///
/// Append-only: every original token is kept in place, and related terms are inserted
/// directly after the token that triggered them.
///
/// A token matching a canonical term (case-insensitive) is followed by all of its
/// synonyms; a token matching a synonym is followed by its canonical term.
pub fn expand(query: &str) -> String {
    let mut expanded: Vec<&str> = Vec::new();

    for word in query.split_whitespace() {
        expanded.push(word);
        let lower = word.to_lowercase();
        for (term, synonyms) in SYNONYMS {
            if lower == *term {
                expanded.extend_from_slice(synonyms);
            } else if synonyms.contains(&lower.as_str()) {
                expanded.push(term);
            }
        }
    }

    expanded.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_term_appends_synonyms() {
        assert_eq!(expand("Proposal plan"), "Proposal offer bid solution plan");
    }

    #[test]
    fn synonym_appends_canonical_term() {
        assert_eq!(expand("rollout Maintenance"), "rollout implementation Maintenance support");
    }

    #[test]
    fn unrelated_query_is_unchanged_apart_from_whitespace() {
        assert_eq!(expand("  cloud   hosting "), "cloud hosting");
        assert_eq!(expand(""), "");
    }

    #[test]
    fn original_tokens_keep_their_order() {
        let out = expand("support the requirements");
        let kept: Vec<&str> = out
            .split(' ')
            .filter(|w| ["support", "the", "requirements"].contains(w))
            .collect();
        assert_eq!(kept, vec!["support", "the", "requirements"]);
    }
}
