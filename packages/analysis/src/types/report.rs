//! Analysis report types - the artifact handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assessment::{RiskAssessment, RiskLevel};

/// Named pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStep {
    /// Input validation (fatal on failure)
    ValidateInput,

    /// Deterministic pattern scan
    PatternScan,

    /// Prompt construction
    BuildPrompt,

    /// External model invocation
    InvokeModel,

    /// Response parsing and validation
    ParseResponse,

    /// Merging pattern- and model-derived findings
    Merge,
}

impl PipelineStep {
    /// Kebab-case name of this step.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::ValidateInput => "validate-input",
            PipelineStep::PatternScan => "pattern-scan",
            PipelineStep::BuildPrompt => "build-prompt",
            PipelineStep::InvokeModel => "invoke-model",
            PipelineStep::ParseResponse => "parse-response",
            PipelineStep::Merge => "merge",
        }
    }
}

/// Outcome of one pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDiagnostic {
    /// Which step this records
    pub step: PipelineStep,

    /// Whether the step completed successfully
    pub success: bool,

    /// Wall-clock duration of the step
    pub duration_ms: u64,

    /// Error message when the step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepDiagnostic {
    /// Record a successful step.
    pub fn ok(step: PipelineStep, duration_ms: u64) -> Self {
        Self {
            step,
            success: true,
            duration_ms,
            error: None,
        }
    }

    /// Record a failed step.
    pub fn failed(step: PipelineStep, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            step,
            success: false,
            duration_ms,
            error: Some(error.into()),
        }
    }
}

/// Number of findings at each severity band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl RiskLevelCounts {
    /// Tally one finding.
    pub fn increment(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Critical => self.critical += 1,
        }
    }

    /// Total findings counted.
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// One entry in the top-categories breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    /// Category name
    pub category: String,

    /// Findings in this category
    pub count: usize,

    /// Mean risk score across those findings
    pub average_risk: u8,
}

/// Human-oriented summary of one analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Findings per severity band
    pub level_counts: RiskLevelCounts,

    /// Up to five categories, by count then average risk
    #[serde(default)]
    pub top_categories: Vec<CategoryBreakdown>,

    /// What this analysis could not cover (failed steps, degraded modes)
    #[serde(default)]
    pub limitations: Vec<String>,

    /// Suggested next steps keyed off the severity mix
    #[serde(default)]
    pub recommended_actions: Vec<String>,
}

/// The final report: the only artifact handed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Unique id for this run
    pub analysis_id: Uuid,

    /// Mean of all assessment scores (0 if none)
    pub overall_risk_score: u8,

    /// Level derived from the overall score
    pub overall_risk_level: RiskLevel,

    /// Mean assessment confidence weighted by step success rate
    pub overall_confidence: u8,

    /// All findings, ordered by risk score descending. Always present,
    /// possibly empty.
    pub risk_assessments: Vec<RiskAssessment>,

    /// Human-oriented summary
    pub summary: AnalysisSummary,

    /// Per-step diagnostics
    pub steps: Vec<StepDiagnostic>,

    /// Total processing duration
    pub duration_ms: u64,

    /// When the analysis completed
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// A zero-risk, zero-confidence result carrying a limitation message.
    ///
    /// Returned when input validation fails or the run is cancelled; the
    /// orchestrator never raises past its boundary.
    pub fn degraded(limitation: impl Into<String>, steps: Vec<StepDiagnostic>) -> Self {
        Self {
            analysis_id: Uuid::new_v4(),
            overall_risk_score: 0,
            overall_risk_level: RiskLevel::Low,
            overall_confidence: 0,
            risk_assessments: Vec::new(),
            summary: AnalysisSummary {
                limitations: vec![limitation.into()],
                recommended_actions: vec![
                    "Provide valid document content and retry the analysis.".to_string(),
                ],
                ..Default::default()
            },
            steps,
            duration_ms: 0,
            analyzed_at: Utc::now(),
        }
    }

    /// Whether any finding is at or above the given level.
    pub fn has_findings_at(&self, level: RiskLevel) -> bool {
        self.risk_assessments.iter().any(|a| a.risk_level >= level)
    }
}
