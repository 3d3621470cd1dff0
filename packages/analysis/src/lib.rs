//! Legal-Document Risk Analysis Library
//!
//! Inspects sanitized legal documents (terms of service, privacy policies)
//! and produces a structured, scored report of potentially unfair or risky
//! clauses. A deterministic pattern scanner runs alongside an external
//! generative model; the model's free-form, untrusted reply is parsed
//! defensively and merged into a single best-effort report.
//!
//! # Design Philosophy
//!
//! **"Always return a report"**
//!
//! - Deterministic findings first; the model refines, never gates
//! - Untrusted model output is extracted, validated, clamped, and flagged
//! - Failures become limitations and reduced confidence, not exceptions
//! - Library handles analysis mechanics; persistence and presentation
//!   belong to the caller
//!
//! # Usage
//!
//! ```rust,ignore
//! use analysis::{Analyzer, AnalysisInput, AnalyzerConfig};
//! use analysis::testing::MockModel;
//!
//! let analyzer = Analyzer::new(MockModel::new());
//!
//! let input = AnalysisInput::from_text(
//!     "We reserve the right to terminate your account at any time.",
//! );
//! let result = analyzer.analyze(&input).await;
//!
//! println!("overall: {} ({})", result.overall_risk_score, result.overall_risk_level.as_str());
//! for finding in &result.risk_assessments {
//!     println!("- {} [{}]", finding.category, finding.risk_score);
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - The model provider seam
//! - [`types`] - Domain types (patterns, assessments, reports)
//! - [`patterns`] - Deterministic clause pattern scanner
//! - [`prompt`] - Prompt builder and template registry
//! - [`invocation`] - Retry/backoff/timeout around the provider
//! - [`providers`] - Provider implementations and decorators
//! - [`parser`] - Multi-strategy response parsing and validation
//! - [`pipeline`] - The orchestrating `Analyzer`
//! - [`security`] - Credential handling
//! - [`testing`] - Mock provider for downstream tests

pub mod error;
pub mod invocation;
pub mod parser;
pub mod patterns;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{AnalysisError, InputError, ParseError, PromptError, Result};
pub use traits::model::{ModelCallError, ModelErrorKind, ModelProvider};
pub use types::{
    normalize_category, AnalysisDepth, AnalysisInput, AnalysisPrompt, AnalysisResult,
    AnalysisSummary, AnalyzerConfig, CategoryBreakdown, CategoryStats, ClausePattern,
    DocumentType, FinishReason, Industry, PatternMatch, PipelineStep, RawModelResponse,
    RiskAssessment, RiskLevel, RiskLevelCounts, RiskProvenance, ScanStatistics, StepDiagnostic,
    TokenUsage,
};

// Re-export the orchestrator
pub use pipeline::Analyzer;

// Re-export pipeline helpers
pub use pipeline::{aggregate_confidence, aggregate_score, merge_assessments};

// Re-export component entry points
pub use invocation::{
    backoff_delay, InvocationClient, InvocationFailure, InvocationOutcome, InvokeOptions,
};
pub use parser::{
    extract_candidate, ExtractionMethod, ParsedAnalysis, ParserConfig, ResponseParser,
    RuleRegistry, RuleSeverity, ValidationContext, ValidationIssue, ValidationRule,
};
pub use patterns::PatternRegistry;
pub use prompt::{PromptBuilder, PromptOptions, PromptTemplate, TemplateRegistry};

// Re-export providers
pub use providers::{ProviderExt, RateLimitedProvider};

#[cfg(feature = "gemini")]
pub use providers::GeminiProvider;

// Re-export credentials
pub use security::{ModelCredentials, SecretString};

// Re-export testing utilities
pub use testing::MockModel;
