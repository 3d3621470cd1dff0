//! Extraction strategies for untrusted model output.
//!
//! The model is asked for a bare JSON object, but replies arrive wrapped in
//! prose, fenced code blocks, or mangled beyond parsing. Strategies run in
//! a fixed order until one yields a candidate object; each can be tested
//! independently.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Confidence assigned to entries synthesized by the key/value fallback.
///
/// Signals reduced reliability; overridable through `ParserConfig`.
pub const KEY_VALUE_FALLBACK_CONFIDENCE: u8 = 40;

/// Which strategy produced a candidate object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    /// First balanced `{...}` span parsed as JSON
    BalancedJson,

    /// JSON inside a fenced code block
    FencedBlock,

    /// Labeled key/value regex salvage with synthesized entries
    KeyValue,

    /// The graceful-degradation fallback generator
    DegradedFallback,
}

/// Run the extraction strategies in order until one yields a candidate.
pub fn extract_candidate(text: &str) -> Option<(Value, ExtractionMethod)> {
    extract_candidate_with(text, KEY_VALUE_FALLBACK_CONFIDENCE)
}

/// As [`extract_candidate`], with an explicit synthesized-entry confidence.
pub fn extract_candidate_with(
    text: &str,
    synthesized_confidence: u8,
) -> Option<(Value, ExtractionMethod)> {
    type Strategy = (ExtractionMethod, fn(&str, u8) -> Option<Value>);
    const STRATEGIES: &[Strategy] = &[
        (ExtractionMethod::BalancedJson, |t, _| balanced_json_span(t)),
        (ExtractionMethod::FencedBlock, |t, _| fenced_block(t)),
        (ExtractionMethod::KeyValue, key_value_salvage),
    ];

    for (method, strategy) in STRATEGIES {
        if let Some(value) = strategy(text, synthesized_confidence) {
            debug!(method = ?method, "extraction strategy succeeded");
            return Some((value, *method));
        }
    }
    None
}

/// Strategy 1: parse the first top-level balanced-brace span.
///
/// Walks the text tracking string and escape state so braces inside string
/// literals do not confuse the depth count.
pub fn balanced_json_span(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let bytes = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in bytes.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let span = &bytes[..idx + 1];
                    return serde_json::from_str(span).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Strategy 2: parse the contents of a fenced code block.
///
/// Accepts blocks tagged `json` or untagged.
pub fn fenced_block(text: &str) -> Option<Value> {
    let regex = regex::Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok()?;
    for captures in regex.captures_iter(text) {
        let body = captures.get(1)?.as_str().trim();
        if body.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return Some(value);
        }
        // The fence may wrap prose around the object
        if let Some(value) = balanced_json_span(body) {
            return Some(value);
        }
    }
    None
}

/// Keyword family checked by the key/value salvage.
struct KeywordFamily {
    category: &'static str,
    label: &'static str,
    keywords: &'static [&'static str],
}

const KEYWORD_FAMILIES: &[KeywordFamily] = &[
    KeywordFamily {
        category: "general-terms",
        label: "general terms",
        keywords: &["unfair", "one-sided", "risky clause", "concerning"],
    },
    KeywordFamily {
        category: "payment-terms",
        label: "payment",
        keywords: &["payment", "billing", "refund", "charge", "subscription"],
    },
    KeywordFamily {
        category: "data-privacy",
        label: "data handling",
        keywords: &["personal data", "privacy", "tracking", "data sharing", "third party"],
    },
    KeywordFamily {
        category: "account-control",
        label: "account control",
        keywords: &["account", "terminate", "suspend", "ban"],
    },
];

/// Strategy 3: labeled key/value salvage.
///
/// Pulls `overallRiskScore`, `riskLevel`, and `confidenceScore` out of
/// free-form text with labeled-number/labeled-enum patterns, and
/// synthesizes coarse low-confidence entries from keyword families found
/// in the raw text. Succeeds only when at least one labeled field matched.
pub fn key_value_salvage(text: &str, synthesized_confidence: u8) -> Option<Value> {
    let score = labeled_number(text, "overallRiskScore");
    let confidence = labeled_number(text, "confidenceScore");
    let level = labeled_level(text);

    if score.is_none() && confidence.is_none() && level.is_none() {
        return None;
    }

    let text_lower = text.to_lowercase();
    let assessments: Vec<Value> = KEYWORD_FAMILIES
        .iter()
        .filter(|family| family.keywords.iter().any(|k| text_lower.contains(k)))
        .map(|family| {
            json!({
                "category": family.category,
                "riskLevel": "medium",
                "riskScore": 50,
                "confidenceScore": synthesized_confidence,
                "summary": format!("Possible {} risk mentioned in the response", family.label),
                "rationale": format!(
                    "Synthesized from {} keywords found in an unstructured reply.",
                    family.label
                ),
                "startPosition": 0,
                "endPosition": 0
            })
        })
        .collect();

    let mut candidate = json!({ "riskAssessments": assessments });
    if let Some(score) = score {
        candidate["overallRiskScore"] = json!(score);
    }
    if let Some(level) = level {
        candidate["riskLevel"] = json!(level);
    }
    if let Some(confidence) = confidence {
        candidate["confidenceScore"] = json!(confidence);
    }
    Some(candidate)
}

/// Find `<label> ... <number>` allowing quotes, colons, and equals signs.
fn labeled_number(text: &str, label: &str) -> Option<f64> {
    let pattern = format!(r#"(?i)"?{}"?\s*[:=]\s*"?(-?\d+(?:\.\d+)?)"#, label);
    let regex = regex::Regex::new(&pattern).ok()?;
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Find a labeled risk level under either accepted key.
fn labeled_level(text: &str) -> Option<String> {
    let regex =
        regex::Regex::new(r#"(?i)"?(?:overall)?riskLevel"?\s*[:=]\s*"?(low|medium|high|critical)"#)
            .ok()?;
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}
