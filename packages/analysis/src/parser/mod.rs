//! Response parsing and validation.
//!
//! Turns the model's untrusted free-form reply into a typed, bounded
//! analysis: ordered extraction strategies, a rule registry, sanitization,
//! and a confidence adjustment that reflects how much correction the reply
//! needed. On total failure the caller can ask for a degraded fallback
//! result instead of propagating an error.

pub mod extract;
pub mod rules;
pub mod sanitize;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::types::assessment::{RiskAssessment, RiskLevel, RiskProvenance};
use crate::types::response::RawModelResponse;

pub use extract::{
    balanced_json_span, extract_candidate, extract_candidate_with, fenced_block,
    key_value_salvage, ExtractionMethod, KEY_VALUE_FALLBACK_CONFIDENCE,
};
pub use rules::{default_rules, RuleFix, RuleRegistry, RuleSeverity, ValidationIssue, ValidationRule};
pub use sanitize::{
    adjust_confidence, truncate_chars, CONFIDENCE_FLOOR, DEFAULT_ASSESSMENT_CONFIDENCE,
    DEFAULT_OVERALL_LEVEL, MAX_ACTION_CHARS, MAX_CONFIDENCE_PENALTY, MAX_RATIONALE_CHARS,
    MAX_SUMMARY_CHARS,
};

/// Confidence assigned to the degraded fallback assessment.
pub const DEGRADED_FALLBACK_CONFIDENCE: u8 = 25;

/// Category assigned to the degraded fallback assessment.
pub const DEGRADED_FALLBACK_CATEGORY: &str = "general-terms";

/// Keyword families driving the degraded fallback's risk estimate.
pub const HIGH_RISK_KEYWORDS: &[&str] = &[
    "indemnify",
    "sole discretion",
    "without notice",
    "irrevocable",
    "perpetual",
    "waive",
    "binding arbitration",
    "no refund",
];

/// Medium-severity keyword family for the degraded fallback.
pub const MEDIUM_RISK_KEYWORDS: &[&str] = &[
    "liability",
    "arbitration",
    "third party",
    "auto-renew",
    "suspend",
    "governing law",
];

/// What the parser knows about the analyzed document.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// Character count of the sanitized text the model saw
    pub content_length: usize,
}

impl ValidationContext {
    /// Create a context for a document of the given length.
    pub fn new(content_length: usize) -> Self {
        Self { content_length }
    }
}

/// Parser behavior options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Reject responses with error-severity violations instead of fixing
    pub strict_mode: bool,

    /// Keep the raw reply text on the parsed result
    pub preserve_raw: bool,

    /// Confidence for entries synthesized by the key/value salvage
    pub key_value_confidence: u8,

    /// Confidence for the degraded fallback assessment
    pub fallback_confidence: u8,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            preserve_raw: false,
            key_value_confidence: KEY_VALUE_FALLBACK_CONFIDENCE,
            fallback_confidence: DEGRADED_FALLBACK_CONFIDENCE,
        }
    }
}

impl ParserConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Keep the raw reply on parsed results.
    pub fn with_preserve_raw(mut self, preserve: bool) -> Self {
        self.preserve_raw = preserve;
        self
    }

    /// Override the key/value salvage confidence.
    pub fn with_key_value_confidence(mut self, confidence: u8) -> Self {
        self.key_value_confidence = confidence;
        self
    }

    /// Override the degraded fallback confidence.
    pub fn with_fallback_confidence(mut self, confidence: u8) -> Self {
        self.fallback_confidence = confidence;
        self
    }
}

/// A validated, sanitized model analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedAnalysis {
    /// Overall risk score reported by the model, sanitized
    pub overall_risk_score: u8,

    /// Overall level reported by the model (flagged, never recomputed,
    /// when it disagrees with the score)
    pub overall_risk_level: RiskLevel,

    /// Overall confidence, sanitized and adjusted for issues
    pub confidence_score: u8,

    /// Individual findings, sanitized and adjusted
    pub assessments: Vec<RiskAssessment>,

    /// Everything that had to be flagged or corrected
    pub issues: Vec<ValidationIssue>,

    /// Which extraction strategy produced the candidate
    pub method: ExtractionMethod,

    /// The raw reply, when `preserve_raw` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ParsedAnalysis {
    /// Whether any issues were recorded.
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Parses and validates raw model responses.
pub struct ResponseParser {
    rules: RuleRegistry,
    config: ParserConfig,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self {
            rules: RuleRegistry::with_defaults(),
            config: ParserConfig::default(),
        }
    }
}

impl ResponseParser {
    /// Create a parser with the default rule set and config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with a custom config.
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            rules: RuleRegistry::with_defaults(),
            config,
        }
    }

    /// Replace the rule registry.
    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    /// The rule registry (add/remove rules at runtime).
    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// The parser config.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a raw model response into a typed analysis.
    ///
    /// Extraction strategies run in order; validation violations block only
    /// in strict mode, otherwise they are downgraded to warnings, suggested
    /// fixes are applied, and sanitization bounds every field. Confidence is
    /// reduced in proportion to the corrections that were needed.
    pub fn parse(
        &self,
        response: &RawModelResponse,
        ctx: &ValidationContext,
    ) -> Result<ParsedAnalysis, ParseError> {
        let (mut candidate, method) =
            extract_candidate_with(&response.text, self.config.key_value_confidence)
                .ok_or(ParseError::ExtractionFailed)?;

        let mut issues = self.rules.validate(&candidate);

        if self.config.strict_mode {
            let blocking: Vec<ValidationIssue> = issues
                .iter()
                .filter(|i| i.severity == RuleSeverity::Error)
                .cloned()
                .collect();
            if !blocking.is_empty() {
                warn!(violations = blocking.len(), "strict mode rejected response");
                return Err(ParseError::ValidationFailed { issues: blocking });
            }
        }

        let fixes = self.rules.apply_fixes(&mut candidate, &issues);
        if fixes > 0 {
            debug!(fixes, "applied suggested fixes");
        }
        for issue in issues.iter_mut() {
            if issue.severity == RuleSeverity::Error {
                issue.severity = RuleSeverity::Warning;
            }
        }

        let (overall_risk_score, overall_risk_level, confidence, mut assessments) =
            sanitize::sanitize_candidate(&candidate, ctx, &self.config, &mut issues);

        let issue_count = issues.len();
        let confidence_score = adjust_confidence(confidence, issue_count);
        for assessment in assessments.iter_mut() {
            assessment.confidence_score =
                adjust_confidence(assessment.confidence_score, issue_count);
        }

        debug!(
            method = ?method,
            issues = issue_count,
            assessments = assessments.len(),
            "response parsed"
        );

        Ok(ParsedAnalysis {
            overall_risk_score,
            overall_risk_level,
            confidence_score,
            assessments,
            issues,
            method,
            raw: self.config.preserve_raw.then(|| response.text.clone()),
        })
    }

    /// Generate the graceful-degradation fallback for an unparseable reply.
    ///
    /// Scans the raw text for high/medium-risk keyword families and returns
    /// a single low-confidence general-category assessment instead of an
    /// error.
    pub fn fallback_analysis(&self, raw_text: &str, content_length: usize) -> ParsedAnalysis {
        let text_lower = raw_text.to_lowercase();

        let (score, level) = if HIGH_RISK_KEYWORDS.iter().any(|k| text_lower.contains(k)) {
            (RiskLevel::High.default_score() + 5, RiskLevel::High)
        } else if MEDIUM_RISK_KEYWORDS.iter().any(|k| text_lower.contains(k)) {
            (RiskLevel::Medium.default_score(), RiskLevel::Medium)
        } else {
            (RiskLevel::Low.default_score() + 5, RiskLevel::Low)
        };
        let confidence = self.config.fallback_confidence;

        warn!(
            score,
            level = level.as_str(),
            "generated degraded fallback assessment"
        );

        let assessment = RiskAssessment::new(
            DEGRADED_FALLBACK_CATEGORY,
            level,
            score,
            confidence,
            RiskProvenance::AiAnalysis,
        )
        .with_summary("Automated keyword-based estimate of overall document risk")
        .with_rationale(
            "The model reply could not be parsed; this estimate comes from scanning the reply \
             for known risk vocabulary and should be treated as low-reliability.",
        )
        .with_span(0, content_length)
        .with_flag("degraded-fallback");

        ParsedAnalysis {
            overall_risk_score: score,
            overall_risk_level: level,
            confidence_score: confidence,
            assessments: vec![assessment],
            issues: vec![ValidationIssue::new(
                "degraded-fallback",
                RuleSeverity::Warning,
                "model reply was unparseable; result synthesized from keyword scan",
            )],
            method: ExtractionMethod::DegradedFallback,
            raw: None,
        }
    }
}
