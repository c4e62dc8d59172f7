//! Parsing of the model's text → category JSON answer.
//!
//! Models wrap JSON in markdown fences and sometimes stop mid-object when
//! they hit the token limit. Strict parsing is tried first; failing that,
//! every complete `"key": "value"` pair is salvaged.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::warn;

fn pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"("(?:[^"\\]|\\.)*")\s*:\s*("(?:[^"\\]|\\.)*")"#).expect("invalid pair regex")
    })
}

/// Remove an optional ```json / ``` fence around the payload.
pub fn strip_code_fence(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse the model answer into text → raw category pairs. Non-string
/// values are dropped.
pub fn parse_assignments(raw: &str) -> BTreeMap<String, String> {
    let cleaned = strip_code_fence(raw);

    match serde_json::from_str::<serde_json::Map<String, Value>>(cleaned) {
        Ok(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
        Err(e) => {
            let recovered = recover_pairs(cleaned);
            warn!(
                error = %e,
                recovered = recovered.len(),
                "model answer is not valid JSON, recovered complete pairs"
            );
            recovered
        }
    }
}

/// Salvage every well-formed `"key": "value"` pair from malformed JSON.
pub fn recover_pairs(text: &str) -> BTreeMap<String, String> {
    pair_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let key = unquote(&caps[1])?;
            let value = unquote(&caps[2])?;
            Some((key, value))
        })
        .collect()
}

fn unquote(quoted: &str) -> Option<String> {
    serde_json::from_str::<String>(quoted).ok()
}
