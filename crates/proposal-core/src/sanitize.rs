/// Text sanitizer applied at every text boundary (ingest, store, retrieve, output).
///
/// Output contains only printable ASCII (0x20..=0x7E), `\n`, `\r`, `\t` and U+00A0.
/// Typographic punctuation is first mapped to ASCII look-alikes, then anything outside
/// Latin-1 is dropped, then anything outside the allow-set is deleted. Sanitizing
/// sanitized text is a no-op.
use std::sync::LazyLock;

use regex::Regex;

/// Ordered substitutions for named punctuation, applied before narrowing.
const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2013}', "-"),    // en dash
    ('\u{2014}', "-"),    // em dash
    ('\u{2018}', "'"),    // left single quote
    ('\u{2019}', "'"),    // right single quote
    ('\u{201C}', "\""),   // left double quote
    ('\u{201D}', "\""),   // right double quote
    ('\u{2026}', "..."),  // ellipsis
    ('\u{2022}', "*"),    // bullet
    ('\u{2122}', "(TM)"), // trade mark
    ('\u{00AE}', "(R)"),  // registered
    ('\u{00A9}', "(C)"),  // copyright
];

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\x20-\x7E\n\r\t\u{00A0}]").expect("valid regex"));

/// Returns `true` if `c` may appear in sanitized text.
pub fn is_allowed(c: char) -> bool {
    matches!(c, '\x20'..='\x7E' | '\n' | '\r' | '\t' | '\u{00A0}')
}

/// Normalize `text` into the sanitized character subset. Never fails.
pub fn sanitize(text: &str) -> String {
    if text.chars().all(is_allowed) {
        return text.to_string();
    }

    let mut replaced = String::with_capacity(text.len());
    for c in text.chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => replaced.push_str(to),
            None => replaced.push(c),
        }
    }

    // Latin-1 narrowing: code points above U+00FF have no single-byte encoding.
    let narrowed: String = replaced.chars().filter(|c| (*c as u32) <= 0xFF).collect();

    DISALLOWED.replace_all(&narrowed, "").into_owned()
}
