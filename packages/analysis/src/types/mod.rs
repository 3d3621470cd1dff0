//! Domain types for the risk analysis pipeline.

pub mod assessment;
pub mod config;
pub mod pattern;
pub mod prompt;
pub mod report;
pub mod response;

pub use assessment::{normalize_category, RiskAssessment, RiskLevel, RiskProvenance};
pub use config::{AnalysisInput, AnalyzerConfig};
pub use pattern::{CategoryStats, ClausePattern, PatternMatch, ScanStatistics};
pub use prompt::{AnalysisDepth, AnalysisPrompt, DocumentType, Industry};
pub use report::{
    AnalysisResult, AnalysisSummary, CategoryBreakdown, PipelineStep, RiskLevelCounts,
    StepDiagnostic,
};
pub use response::{FinishReason, RawModelResponse, TokenUsage};
