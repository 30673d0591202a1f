// src/text.rs
//! Text helpers shared by extraction, search and scoring: word-capped
//! truncation, whitespace collapsing, content hashing and URL keys.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Word cap applied to every description that leaves or enters the pipeline.
pub const WORD_LIMIT: usize = 300;

/// Keep at most `max_words` whitespace-separated words, joined by single spaces.
/// Texts at or under the cap are returned unchanged.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > max_words {
        tracing::debug!(from = words.len(), to = max_words, "truncated text to word limit");
        words[..max_words].join(" ")
    } else {
        text.to_string()
    }
}

/// Same as `truncate_words`, also reporting whether anything was cut.
pub fn truncate_words_flagged(text: &str, max_words: usize) -> (String, bool) {
    let count = word_count(text);
    (truncate_words(text, max_words), count > max_words)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Collapse any whitespace run into one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case- and whitespace-insensitive content hash (hex sha256).
pub fn content_hash(text: &str) -> String {
    let normalized = collapse_whitespace(&text.to_lowercase());
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short digest for logs, so raw descriptions never end up in log output.
pub fn anon_id(text: &str) -> String {
    content_hash(text).chars().take(12).collect()
}

/// Comparison key for URLs: query and fragment dropped, trailing slashes
/// stripped, lowercased.
pub fn normalize_url(url: &str) -> String {
    let no_fragment = url.split('#').next().unwrap_or("");
    let no_query = no_fragment.split('?').next().unwrap_or("");
    no_query.trim().trim_end_matches('/').to_lowercase()
}

/// Decode HTML entities left in API text (`&amp;`, `&#39;`) and trim.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).trim().to_string()
}

/// Cut at `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

static RE_FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)").expect("number regex"));

/// First run of digits in `text`, or 0.
pub fn first_number(text: &str) -> u64 {
    RE_FIRST_NUMBER
        .captures(text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join("  \n ")
    }

    #[test]
    fn truncate_caps_at_exact_word_count() {
        let out = truncate_words(&words(450), 300);
        assert_eq!(out.split(' ').count(), 300);
        assert!(out.starts_with("w0 w1 w2"));
        assert!(out.ends_with("w299"));
        assert!(!out.contains("  "));
    }

    #[test]
    fn truncate_is_idempotent() {
        let once = truncate_words(&words(301), 300);
        let twice = truncate_words(&once, 300);
        assert_eq!(once, twice);
    }

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_words("a  b", 300), "a  b");
        assert_eq!(truncate_words("", 300), "");
    }

    #[test]
    fn flagged_truncation_reports_cut() {
        let (_, cut) = truncate_words_flagged(&words(301), 300);
        assert!(cut);
        let (_, cut) = truncate_words_flagged(&words(300), 300);
        assert!(!cut);
    }

    #[test]
    fn hash_ignores_case_and_whitespace_runs() {
        let a = content_hash("An AI   fact\tchecker");
        let b = content_hash("  an ai fact\n\nCHECKER ");
        assert_eq!(a, b);
        assert_ne!(a, content_hash("an ai fact checkers"));
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities(" Facts &amp; sources &#39;live&#39; "), "Facts & sources 'live'");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[test]
    fn url_normalization_strips_query_fragment_and_slash() {
        assert_eq!(
            normalize_url("https://Devpost.com/software/Foo/?ref=1#top"),
            "https://devpost.com/software/foo"
        );
        assert_eq!(
            normalize_url("https://devpost.com/software/foo"),
            "https://devpost.com/software/foo"
        );
    }

    #[test]
    fn first_number_parses_counts() {
        assert_eq!(first_number(" 12 likes"), 12);
        assert_eq!(first_number("none"), 0);
    }
}
