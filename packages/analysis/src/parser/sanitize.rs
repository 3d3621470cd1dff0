//! Sanitization of extracted candidates.
//!
//! Every numeric field is clamped and rounded into [0, 100], level strings
//! are matched case-insensitively against the four-value enum, text fields
//! are truncated to fixed ceilings, and positions are clamped to the
//! analyzed text and reordered. A level that disagrees with its score is
//! recorded as an issue, never rewritten. Corrections feed the confidence
//! adjustment: a response that needed fixing is trusted less.

use serde_json::Value;

use super::rules::{coerce_number, RuleSeverity, ValidationIssue};
use super::{ParserConfig, ValidationContext};
use crate::types::assessment::{normalize_category, RiskAssessment, RiskLevel, RiskProvenance};

/// Ceiling for assessment summaries, in characters.
pub const MAX_SUMMARY_CHARS: usize = 200;

/// Ceiling for assessment rationales, in characters.
pub const MAX_RATIONALE_CHARS: usize = 1_000;

/// Ceiling for suggested actions, in characters.
pub const MAX_ACTION_CHARS: usize = 500;

/// Confidence values at or below this floor are never reduced further.
pub const CONFIDENCE_FLOOR: u8 = 20;

/// Maximum total confidence penalty from recorded issues.
pub const MAX_CONFIDENCE_PENALTY: u8 = 30;

/// Confidence penalty per recorded issue.
pub const CONFIDENCE_PENALTY_PER_ISSUE: u8 = 5;

/// Level assumed when the overall level is missing or unrecognized.
pub const DEFAULT_OVERALL_LEVEL: RiskLevel = RiskLevel::Medium;

/// Confidence assumed when an assessment omits its own.
pub const DEFAULT_ASSESSMENT_CONFIDENCE: u8 = 50;

/// Reduce a confidence value in proportion to recorded issues.
///
/// Values already at or below the floor pass through unchanged (a clamped
/// zero stays zero); everything else loses `min(30, 5 x issues)` points,
/// bottoming out at the floor.
pub fn adjust_confidence(value: u8, issue_count: usize) -> u8 {
    if issue_count == 0 || value <= CONFIDENCE_FLOOR {
        return value;
    }
    let penalty = (CONFIDENCE_PENALTY_PER_ISSUE as usize * issue_count)
        .min(MAX_CONFIDENCE_PENALTY as usize) as u8;
    value.saturating_sub(penalty).max(CONFIDENCE_FLOOR)
}

/// Truncate a string to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Sanitize an extracted candidate into typed fields.
///
/// Returns (overall score, overall level, overall confidence, assessments)
/// and records every correction in `issues`.
pub(crate) fn sanitize_candidate(
    candidate: &Value,
    ctx: &ValidationContext,
    config: &ParserConfig,
    issues: &mut Vec<ValidationIssue>,
) -> (u8, RiskLevel, u8, Vec<RiskAssessment>) {
    let overall_score = sanitize_score(
        candidate.get("overallRiskScore"),
        0,
        "overallRiskScore",
        issues,
    );

    let raw_level = candidate
        .get("riskLevel")
        .or_else(|| candidate.get("overallRiskLevel"))
        .and_then(Value::as_str);
    let overall_level = match raw_level.and_then(RiskLevel::parse) {
        Some(level) => level,
        None => {
            issues.push(ValidationIssue::new(
                "sanitize-overall-level",
                RuleSeverity::Warning,
                format!(
                    "unrecognized overall risk level {:?}, defaulted to {}",
                    raw_level.unwrap_or("<missing>"),
                    DEFAULT_OVERALL_LEVEL.as_str()
                ),
            ));
            DEFAULT_OVERALL_LEVEL
        }
    };

    if overall_level != RiskLevel::from_score(overall_score) {
        issues.push(ValidationIssue::new(
            "sanitize-level-score-mismatch",
            RuleSeverity::Warning,
            format!(
                "overall level {} does not match score {}",
                overall_level.as_str(),
                overall_score
            ),
        ));
    }

    let overall_confidence = sanitize_score(
        candidate.get("confidenceScore"),
        DEFAULT_ASSESSMENT_CONFIDENCE,
        "confidenceScore",
        issues,
    );

    let assessments = match candidate.get("riskAssessments") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| sanitize_assessment(entry, ctx, config, issues))
            .collect(),
        Some(_) => {
            issues.push(ValidationIssue::new(
                "sanitize-assessments-shape",
                RuleSeverity::Warning,
                "riskAssessments was not an array, treated as empty",
            ));
            Vec::new()
        }
        None => {
            issues.push(ValidationIssue::new(
                "sanitize-assessments-missing",
                RuleSeverity::Warning,
                "riskAssessments was absent, treated as empty",
            ));
            Vec::new()
        }
    };

    (overall_score, overall_level, overall_confidence, assessments)
}

/// Sanitize one assessment entry. Non-object entries are dropped.
fn sanitize_assessment(
    entry: &Value,
    ctx: &ValidationContext,
    _config: &ParserConfig,
    issues: &mut Vec<ValidationIssue>,
) -> Option<RiskAssessment> {
    if !entry.is_object() {
        issues.push(ValidationIssue::new(
            "sanitize-assessment-shape",
            RuleSeverity::Warning,
            "dropped a non-object assessment entry",
        ));
        return None;
    }

    let mut flags = Vec::new();

    let category = match entry.get("category").and_then(Value::as_str) {
        Some(raw) => normalize_category(raw),
        None => {
            flags.push("category-defaulted".to_string());
            "general".to_string()
        }
    };

    let raw_level = entry.get("riskLevel").and_then(Value::as_str);
    let level = match raw_level.and_then(RiskLevel::parse) {
        Some(level) => level,
        None => {
            flags.push("level-defaulted".to_string());
            RiskLevel::Low
        }
    };

    let score = match entry.get("riskScore").and_then(coerce_number) {
        Some(n) => {
            let clamped = clamp_round(n);
            if !(0.0..=100.0).contains(&n) {
                flags.push("score-clamped".to_string());
            }
            clamped
        }
        None => {
            flags.push("score-defaulted".to_string());
            level.default_score()
        }
    };

    let confidence = match entry.get("confidenceScore").and_then(coerce_number) {
        Some(n) => {
            let clamped = clamp_round(n);
            if !(0.0..=100.0).contains(&n) {
                flags.push("confidence-clamped".to_string());
            }
            clamped
        }
        None => {
            flags.push("confidence-defaulted".to_string());
            DEFAULT_ASSESSMENT_CONFIDENCE
        }
    };

    if level != RiskLevel::from_score(score) {
        flags.push("level-score-mismatch".to_string());
    }

    let summary = sanitize_text(entry.get("summary"), MAX_SUMMARY_CHARS, &mut flags, "summary");
    let rationale = sanitize_text(
        entry.get("rationale"),
        MAX_RATIONALE_CHARS,
        &mut flags,
        "rationale",
    );
    let suggested_action = entry
        .get("suggestedAction")
        .and_then(Value::as_str)
        .map(|s| {
            if s.chars().count() > MAX_ACTION_CHARS {
                flags.push("suggested-action-truncated".to_string());
            }
            truncate_chars(s, MAX_ACTION_CHARS)
        });

    let (start, end) = sanitize_positions(entry, ctx.content_length, &mut flags);

    for flag in &flags {
        issues.push(ValidationIssue::new(
            format!("sanitize-{}", flag),
            RuleSeverity::Warning,
            format!("assessment '{}': {}", category, flag.replace('-', " ")),
        ));
    }

    let mut assessment = RiskAssessment::new(
        category,
        level,
        score,
        confidence,
        RiskProvenance::AiAnalysis,
    )
    .with_span(start, end);
    assessment.summary = summary;
    assessment.rationale = rationale;
    assessment.suggested_action = suggested_action;
    assessment.flags = flags;
    Some(assessment)
}

/// Clamp and round an untrusted number into [0, 100].
fn clamp_round(n: f64) -> u8 {
    n.round().clamp(0.0, 100.0) as u8
}

/// Sanitize a score-like field, recording clamps and defaults.
fn sanitize_score(
    value: Option<&Value>,
    default: u8,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) -> u8 {
    match value.and_then(coerce_number) {
        Some(n) => {
            let clamped = clamp_round(n);
            if !(0.0..=100.0).contains(&n) {
                issues.push(ValidationIssue::new(
                    "sanitize-score-clamped",
                    RuleSeverity::Warning,
                    format!("{} {} clamped to {}", field, n, clamped),
                ));
            }
            clamped
        }
        None => {
            issues.push(ValidationIssue::new(
                "sanitize-score-missing",
                RuleSeverity::Warning,
                format!("{} missing or non-numeric, defaulted to {}", field, default),
            ));
            default
        }
    }
}

/// Pull a string field, truncating to the ceiling.
fn sanitize_text(
    value: Option<&Value>,
    max: usize,
    flags: &mut Vec<String>,
    field: &str,
) -> String {
    match value.and_then(Value::as_str) {
        Some(s) => {
            if s.chars().count() > max {
                flags.push(format!("{}-truncated", field));
            }
            truncate_chars(s, max)
        }
        None => String::new(),
    }
}

/// Clamp positions to the analyzed text and reorder so start <= end.
fn sanitize_positions(
    entry: &Value,
    content_length: usize,
    flags: &mut Vec<String>,
) -> (usize, usize) {
    let read = |field: &str| -> usize {
        entry
            .get(field)
            .and_then(coerce_number)
            .map(|n| n.max(0.0).round() as usize)
            .unwrap_or(0)
    };

    let mut start = read("startPosition");
    let mut end = read("endPosition");

    if start > content_length || end > content_length {
        flags.push("positions-clamped".to_string());
        start = start.min(content_length);
        end = end.min(content_length);
    }
    if start > end {
        flags.push("positions-reordered".to_string());
        std::mem::swap(&mut start, &mut end);
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_confidence_penalty_and_floor() {
        assert_eq!(adjust_confidence(90, 0), 90);
        assert_eq!(adjust_confidence(90, 2), 80);
        assert_eq!(adjust_confidence(90, 6), 60); // capped at 30
        assert_eq!(adjust_confidence(25, 6), 20); // bottoms at floor
        assert_eq!(adjust_confidence(20, 3), 20); // at floor: untouched
        assert_eq!(adjust_confidence(0, 3), 0); // below floor: untouched
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }
}
