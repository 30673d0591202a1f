// src/llm/decode.rs
//! Defensive decoding of model output that is supposed to be JSON.
//!
//! Models wrap JSON in markdown fences, prepend prose, or refuse outright.
//! `decode_json` classifies every response into one of four outcomes so the
//! scorer and the strategy generator share one set of rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Phrases that mark a prose answer as "the input was not usable".
pub const REFUSAL_PHRASES: &[&str] = &[
    "cannot analyze",
    "missing",
    "invalid",
    "not provided",
    "not a specific project",
    "description is missing",
];

static RE_BRACE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("brace span regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Parsed as-is (after fence stripping).
    Parsed(Value),
    /// Direct parse failed; the outermost brace span parsed.
    Recovered(Value),
    /// Prose answer carrying a refusal phrase.
    Refusal(String),
    /// Neither JSON nor a recognizable refusal.
    Unparsable(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("model could not process the input: {0}")]
    Refusal(String),
    #[error("model returned unparsable output: {0}")]
    Unparsable(String),
}

impl Decoded {
    pub fn into_result(self) -> Result<Value, DecodeError> {
        match self {
            Decoded::Parsed(v) | Decoded::Recovered(v) => Ok(v),
            Decoded::Refusal(s) => Err(DecodeError::Refusal(s)),
            Decoded::Unparsable(s) => Err(DecodeError::Unparsable(s)),
        }
    }
}

/// Remove a surrounding markdown code fence, preferring a ```json fence.
pub fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };
    inner.trim()
}

pub fn is_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    REFUSAL_PHRASES.iter().any(|p| lower.contains(p))
}

pub fn decode_json(raw: &str) -> Decoded {
    let text = strip_fences(raw);
    let snippet = crate::text::truncate_chars(text, 200);

    if !text.starts_with('{') && !text.starts_with('[') {
        return if is_refusal(text) {
            Decoded::Refusal(snippet)
        } else {
            Decoded::Unparsable(snippet)
        };
    }

    match serde_json::from_str::<Value>(text) {
        Ok(v) => Decoded::Parsed(v),
        Err(first) => {
            tracing::debug!(error = %first, "direct JSON parse failed, trying brace span");
            RE_BRACE_SPAN
                .find(text)
                .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
                .map(Decoded::Recovered)
                .unwrap_or(Decoded::Unparsable(snippet))
        }
    }
}

/// Decode and deserialize into `T`. Shape mismatches count as unparsable.
pub fn decode_as<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let decoded = decode_json(raw);
    if let Decoded::Recovered(_) = decoded {
        tracing::info!("recovered JSON from surrounding text");
    }
    let value = decoded.into_result()?;
    serde_json::from_value(value).map_err(|e| DecodeError::Unparsable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_parses() {
        assert_eq!(decode_json(r#"{"a":1}"#), Decoded::Parsed(json!({"a":1})));
    }

    #[test]
    fn json_fence_is_stripped() {
        let raw = "Here you go:\n```json\n{\"a\": [1, 2]}\n```\nthanks";
        assert_eq!(decode_json(raw), Decoded::Parsed(json!({"a":[1,2]})));
    }

    #[test]
    fn bare_fence_is_stripped() {
        let raw = "```\n[1,2]\n```";
        assert_eq!(decode_json(raw), Decoded::Parsed(json!([1, 2])));
    }

    #[test]
    fn trailing_prose_is_recovered_from_brace_span() {
        let raw = r#"{"fraud_risk": "LOW"} Let me know if you need more."#;
        assert_eq!(decode_json(raw), Decoded::Recovered(json!({"fraud_risk":"LOW"})));
    }

    #[test]
    fn prose_with_refusal_phrase_is_refusal() {
        let raw = "I cannot analyze this project because the description is too short.";
        assert!(matches!(decode_json(raw), Decoded::Refusal(_)));
        assert!(matches!(
            decode_as::<Value>(raw),
            Err(DecodeError::Refusal(_))
        ));
    }

    #[test]
    fn other_prose_is_unparsable() {
        assert!(matches!(
            decode_json("Sure! Here are some thoughts."),
            Decoded::Unparsable(_)
        ));
        assert!(matches!(decode_json("{ not json"), Decoded::Unparsable(_)));
    }

    #[test]
    fn shape_mismatch_is_unparsable() {
        #[derive(serde::Deserialize, Debug)]
        struct Needs {
            #[allow(dead_code)]
            field: u32,
        }
        assert!(matches!(
            decode_as::<Needs>(r#"{"other": 1}"#),
            Err(DecodeError::Unparsable(_))
        ));
    }
}
