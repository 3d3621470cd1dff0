//! Validation rules for parsed model output.
//!
//! Rules are plain data plus a predicate: they inspect the extracted
//! candidate object and report violations bucketed by severity. Error
//! violations block the parse only in strict mode; otherwise they are
//! downgraded to warnings and any suggested fix is applied before
//! sanitization.

use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::RiskLevel;

/// Severity of a validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    /// Blocks the parse in strict mode
    Error,

    /// Recorded and surfaced, never blocking
    Warning,

    /// Informational only
    Info,
}

/// A recorded rule violation (or sanitizer correction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Id of the rule (or sanitizer step) that reported this
    pub rule_id: String,

    /// Severity at the time of recording
    pub severity: RuleSeverity,

    /// What was wrong
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue.
    pub fn new(
        rule_id: impl Into<String>,
        severity: RuleSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule_id, self.message)
    }
}

/// A suggested auto-fix: replace the value at `pointer` with `value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFix {
    /// JSON pointer to the field to replace (e.g., "/riskLevel")
    pub pointer: String,

    /// Replacement value
    pub value: Value,
}

/// A validation rule: id, category, severity, predicate, optional fix.
#[derive(Clone)]
pub struct ValidationRule {
    /// Unique rule id (registry key)
    pub id: String,

    /// Grouping category (e.g., "scores", "shape")
    pub category: String,

    /// Severity of a violation
    pub severity: RuleSeverity,

    /// Message recorded on violation
    pub message: String,

    /// Returns true when the candidate satisfies the rule
    predicate: Arc<dyn Fn(&Value) -> bool + Send + Sync>,

    /// Optional auto-fix applied in non-strict mode
    pub fix: Option<RuleFix>,
}

impl ValidationRule {
    /// Create a rule from a predicate.
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        severity: RuleSeverity,
        message: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            severity,
            message: message.into(),
            predicate: Arc::new(predicate),
            fix: None,
        }
    }

    /// Attach a suggested fix.
    pub fn with_fix(mut self, pointer: impl Into<String>, value: Value) -> Self {
        self.fix = Some(RuleFix {
            pointer: pointer.into(),
            value,
        });
        self
    }

    /// Evaluate the rule against a candidate.
    pub fn check(&self, candidate: &Value) -> bool {
        (self.predicate)(candidate)
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .field("fix", &self.fix)
            .finish()
    }
}

/// Registry of validation rules keyed by id.
///
/// Accessors return clones to prevent external mutation of internal state.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Arc<RwLock<IndexMap<String, ValidationRule>>>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the default rule set.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for rule in default_rules() {
            registry.add(rule);
        }
        registry
    }

    /// Register a rule, replacing any existing one with the same id.
    pub fn add(&self, rule: ValidationRule) {
        self.rules.write().unwrap().insert(rule.id.clone(), rule);
    }

    /// Remove a rule by id.
    pub fn remove(&self, id: &str) -> bool {
        self.rules.write().unwrap().shift_remove(id).is_some()
    }

    /// Ids of all registered rules, in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.rules.read().unwrap().keys().cloned().collect()
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.read().unwrap().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.read().unwrap().is_empty()
    }

    /// Run every rule against a candidate and collect violations.
    pub fn validate(&self, candidate: &Value) -> Vec<ValidationIssue> {
        let rules = self.rules.read().unwrap();
        let issues: Vec<ValidationIssue> = rules
            .values()
            .filter(|rule| !rule.check(candidate))
            .map(|rule| ValidationIssue::new(&rule.id, rule.severity, &rule.message))
            .collect();

        if !issues.is_empty() {
            debug!(violations = issues.len(), "validation found issues");
        }
        issues
    }

    /// Apply the suggested fixes of violated rules to the candidate.
    ///
    /// Returns the number of fixes applied. A fix whose pointer names a
    /// missing top-level field is inserted rather than skipped.
    pub fn apply_fixes(&self, candidate: &mut Value, issues: &[ValidationIssue]) -> usize {
        let rules = self.rules.read().unwrap();
        let mut applied = 0;

        for issue in issues {
            let Some(rule) = rules.get(&issue.rule_id) else {
                continue;
            };
            let Some(fix) = &rule.fix else {
                continue;
            };

            if let Some(slot) = candidate.pointer_mut(&fix.pointer) {
                *slot = fix.value.clone();
                applied += 1;
            } else if let Some(field) = fix.pointer.strip_prefix('/') {
                if !field.contains('/') {
                    if let Some(object) = candidate.as_object_mut() {
                        object.insert(field.to_string(), fix.value.clone());
                        applied += 1;
                    }
                }
            }
        }
        applied
    }
}

/// Whether the field, if present, is a number (or numeric string) in [0, 100].
fn score_in_range(candidate: &Value, field: &str) -> bool {
    match candidate.get(field) {
        None => true,
        Some(value) => matches!(coerce_number(value), Some(n) if (0.0..=100.0).contains(&n)),
    }
}

/// Accept JSON numbers and numeric strings.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The overall level field under either accepted key.
fn overall_level(candidate: &Value) -> Option<&Value> {
    candidate
        .get("riskLevel")
        .or_else(|| candidate.get("overallRiskLevel"))
}

/// The default rule set: score ranges, enum membership, array shape, and
/// level/score consistency.
pub fn default_rules() -> Vec<ValidationRule> {
    vec![
        ValidationRule::new(
            "overall-score-range",
            "scores",
            RuleSeverity::Error,
            "overallRiskScore must be a number between 0 and 100",
            |c| score_in_range(c, "overallRiskScore"),
        ),
        ValidationRule::new(
            "overall-level-enum",
            "enums",
            RuleSeverity::Error,
            "riskLevel must be one of low, medium, high, critical",
            |c| match overall_level(c) {
                None => true,
                Some(value) => value
                    .as_str()
                    .map(|s| RiskLevel::parse(s).is_some())
                    .unwrap_or(false),
            },
        )
        .with_fix("/riskLevel", Value::String("medium".to_string())),
        ValidationRule::new(
            "confidence-range",
            "scores",
            RuleSeverity::Error,
            "confidenceScore must be a number between 0 and 100",
            |c| score_in_range(c, "confidenceScore"),
        ),
        ValidationRule::new(
            "assessments-array",
            "shape",
            RuleSeverity::Error,
            "riskAssessments must be present and an array",
            |c| c.get("riskAssessments").map(Value::is_array).unwrap_or(false),
        )
        .with_fix("/riskAssessments", Value::Array(Vec::new())),
        ValidationRule::new(
            "assessment-fields",
            "scores",
            RuleSeverity::Error,
            "each assessment needs in-range scores and a valid riskLevel",
            |c| {
                let Some(entries) = c.get("riskAssessments").and_then(Value::as_array) else {
                    return true;
                };
                entries.iter().all(|entry| {
                    score_in_range(entry, "riskScore")
                        && score_in_range(entry, "confidenceScore")
                        && match entry.get("riskLevel") {
                            None => true,
                            Some(level) => level
                                .as_str()
                                .map(|s| RiskLevel::parse(s).is_some())
                                .unwrap_or(false),
                        }
                })
            },
        ),
        ValidationRule::new(
            "level-score-consistency",
            "consistency",
            RuleSeverity::Error,
            "riskLevel must match the fixed score thresholds",
            |c| {
                let score = c.get("overallRiskScore").and_then(coerce_number);
                let level = overall_level(c)
                    .and_then(Value::as_str)
                    .and_then(RiskLevel::parse);
                match (score, level) {
                    (Some(score), Some(level)) if (0.0..=100.0).contains(&score) => {
                        RiskLevel::from_score(score.round() as u8) == level
                    }
                    _ => true,
                }
            },
        ),
        ValidationRule::new(
            "positions-ordered",
            "shape",
            RuleSeverity::Warning,
            "startPosition must not exceed endPosition",
            |c| {
                let Some(entries) = c.get("riskAssessments").and_then(Value::as_array) else {
                    return true;
                };
                entries.iter().all(|entry| {
                    let start = entry.get("startPosition").and_then(coerce_number);
                    let end = entry.get("endPosition").and_then(coerce_number);
                    match (start, end) {
                        (Some(start), Some(end)) => start <= end,
                        _ => true,
                    }
                })
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_candidate_passes() {
        let registry = RuleRegistry::with_defaults();
        let candidate = json!({
            "overallRiskScore": 70,
            "riskLevel": "high",
            "confidenceScore": 90,
            "riskAssessments": []
        });

        assert!(registry.validate(&candidate).is_empty());
    }

    #[test]
    fn test_out_of_range_and_bad_enum_flagged() {
        let registry = RuleRegistry::with_defaults();
        let candidate = json!({
            "overallRiskScore": 150,
            "riskLevel": "extreme",
            "confidenceScore": -5,
            "riskAssessments": []
        });

        let issues = registry.validate(&candidate);
        let ids: Vec<&str> = issues.iter().map(|i| i.rule_id.as_str()).collect();
        assert!(ids.contains(&"overall-score-range"));
        assert!(ids.contains(&"overall-level-enum"));
        assert!(ids.contains(&"confidence-range"));
    }

    #[test]
    fn test_missing_assessments_array_flagged_and_fixed() {
        let registry = RuleRegistry::with_defaults();
        let mut candidate = json!({"overallRiskScore": 10, "riskLevel": "low"});

        let issues = registry.validate(&candidate);
        assert!(issues.iter().any(|i| i.rule_id == "assessments-array"));

        let applied = registry.apply_fixes(&mut candidate, &issues);
        assert!(applied >= 1);
        assert!(candidate["riskAssessments"].is_array());
    }

    #[test]
    fn test_level_enum_fix_rewrites_value() {
        let registry = RuleRegistry::with_defaults();
        let mut candidate = json!({
            "overallRiskScore": 50,
            "riskLevel": "extreme",
            "riskAssessments": []
        });

        let issues = registry.validate(&candidate);
        registry.apply_fixes(&mut candidate, &issues);
        assert_eq!(candidate["riskLevel"], "medium");
    }

    #[test]
    fn test_level_score_consistency() {
        let registry = RuleRegistry::with_defaults();

        let consistent = json!({
            "overallRiskScore": 85,
            "riskLevel": "critical",
            "riskAssessments": []
        });
        assert!(!registry
            .validate(&consistent)
            .iter()
            .any(|i| i.rule_id == "level-score-consistency"));

        let inconsistent = json!({
            "overallRiskScore": 85,
            "riskLevel": "low",
            "riskAssessments": []
        });
        assert!(registry
            .validate(&inconsistent)
            .iter()
            .any(|i| i.rule_id == "level-score-consistency"));
    }

    #[test]
    fn test_assessment_entry_rules() {
        let registry = RuleRegistry::with_defaults();
        let candidate = json!({
            "overallRiskScore": 50,
            "riskLevel": "medium",
            "confidenceScore": 80,
            "riskAssessments": [
                {"riskScore": 120, "confidenceScore": 50, "riskLevel": "high"},
                {"riskScore": 50, "confidenceScore": 50, "riskLevel": "weird"}
            ]
        });

        let issues = registry.validate(&candidate);
        assert!(issues.iter().any(|i| i.rule_id == "assessment-fields"));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let registry = RuleRegistry::with_defaults();
        let candidate = json!({
            "overallRiskScore": "70",
            "riskLevel": "high",
            "confidenceScore": "90",
            "riskAssessments": []
        });

        assert!(registry.validate(&candidate).is_empty());
    }

    #[test]
    fn test_custom_rule_add_remove() {
        let registry = RuleRegistry::with_defaults();
        let before = registry.len();

        registry.add(ValidationRule::new(
            "summary-required",
            "shape",
            RuleSeverity::Info,
            "a summary should be present",
            |c| c.get("summary").is_some(),
        ));
        assert_eq!(registry.len(), before + 1);

        let issues = registry.validate(&json!({"riskAssessments": []}));
        assert!(issues.iter().any(|i| i.rule_id == "summary-required"));

        assert!(registry.remove("summary-required"));
        assert!(!registry.remove("summary-required"));
    }
}
