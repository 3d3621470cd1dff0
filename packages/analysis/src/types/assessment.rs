//! Risk assessment types - the findings surfaced to callers.

use serde::{Deserialize, Serialize};

/// Severity band for a risk finding.
///
/// Derived deterministically from a 0-100 risk score: >= 80 critical,
/// >= 60 high, >= 40 medium, else low. A stored level that disagrees with
/// its score is a validation violation, never silently rewritten.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Routine contract language
    #[default]
    Low,

    /// Worth reviewing before accepting
    Medium,

    /// Materially unfavorable to the user
    High,

    /// Severe one-sided terms
    Critical,
}

impl RiskLevel {
    /// Map a 0-100 score onto a level using the fixed thresholds.
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            RiskLevel::Critical
        } else if score >= 60 {
            RiskLevel::High
        } else if score >= 40 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Default score assigned when a finding carries a level but no score.
    pub fn default_score(self) -> u8 {
        match self {
            RiskLevel::Low => 20,
            RiskLevel::Medium => 50,
            RiskLevel::High => 70,
            RiskLevel::Critical => 90,
        }
    }

    /// Lowercase name of this level.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Parse a level name, case-insensitively. `None` for anything outside
    /// the four-value set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

/// Where a risk finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProvenance {
    /// Produced by the deterministic pattern scanner
    PatternMatching,

    /// Produced by the external model
    AiAnalysis,

    /// Found independently by both scanner and model
    Hybrid,
}

/// A single risk finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Lowercase kebab-case category (e.g., "account-termination")
    pub category: String,

    /// Severity band
    pub risk_level: RiskLevel,

    /// How severe the finding is if true (0-100)
    pub risk_score: u8,

    /// How trustworthy the finding is (0-100)
    pub confidence_score: u8,

    /// One-line human-readable summary
    pub summary: String,

    /// Why this clause is considered risky
    pub rationale: String,

    /// Suggested follow-up, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,

    /// Character offset where the clause starts in the sanitized text
    pub start_position: usize,

    /// Character offset where the clause ends
    pub end_position: usize,

    /// Which subsystem produced this finding
    pub provenance: RiskProvenance,

    /// Corrections applied during validation/sanitization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

impl RiskAssessment {
    /// Create a new assessment with empty text fields and zero positions.
    pub fn new(
        category: impl Into<String>,
        risk_level: RiskLevel,
        risk_score: u8,
        confidence_score: u8,
        provenance: RiskProvenance,
    ) -> Self {
        Self {
            category: normalize_category(&category.into()),
            risk_level,
            risk_score,
            confidence_score,
            summary: String::new(),
            rationale: String::new(),
            suggested_action: None,
            start_position: 0,
            end_position: 0,
            provenance,
            flags: Vec::new(),
        }
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the rationale.
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Set the suggested action.
    pub fn with_suggested_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }

    /// Set the character span.
    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start_position = start;
        self.end_position = end;
        self
    }

    /// Record a correction flag.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Whether the stored level agrees with the stored score.
    pub fn level_matches_score(&self) -> bool {
        self.risk_level == RiskLevel::from_score(self.risk_score)
    }
}

/// Normalize a category string to lowercase kebab-case.
///
/// CamelCase humps become dash-separated, runs of non-alphanumeric
/// characters collapse to a single dash, and an empty result falls back
/// to "general".
pub fn normalize_category(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev: Option<char> = None;

    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() {
                if matches!(prev, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit()) {
                    out.push('-');
                }
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c);
            }
            prev = Some(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
            prev = Some('-');
        }
    }

    while out.ends_with('-') {
        out.pop();
    }

    if out.is_empty() {
        "general".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_score_thresholds() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(RiskLevel::parse("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse(" medium "), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse("extreme"), None);
        assert_eq!(RiskLevel::parse(""), None);
    }

    #[test]
    fn test_provenance_serde_names() {
        let json = serde_json::to_string(&RiskProvenance::PatternMatching).unwrap();
        assert_eq!(json, "\"pattern_matching\"");
        let json = serde_json::to_string(&RiskProvenance::AiAnalysis).unwrap();
        assert_eq!(json, "\"ai_analysis\"");
        let json = serde_json::to_string(&RiskProvenance::Hybrid).unwrap();
        assert_eq!(json, "\"hybrid\"");
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("Account Termination"), "account-termination");
        assert_eq!(normalize_category("dataPrivacy"), "data-privacy");
        assert_eq!(normalize_category("payment__terms!!"), "payment-terms");
        assert_eq!(normalize_category("  liability-waiver  "), "liability-waiver");
        assert_eq!(normalize_category("???"), "general");
        assert_eq!(normalize_category(""), "general");
    }

    #[test]
    fn test_level_matches_score() {
        let ok = RiskAssessment::new(
            "test",
            RiskLevel::High,
            70,
            80,
            RiskProvenance::AiAnalysis,
        );
        assert!(ok.level_matches_score());

        let mismatch = RiskAssessment::new(
            "test",
            RiskLevel::Low,
            95,
            80,
            RiskProvenance::AiAnalysis,
        );
        assert!(!mismatch.level_matches_score());
    }
}
