//! Typed errors for the analysis library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

use crate::parser::rules::ValidationIssue;

/// Errors that can occur during analysis operations.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Input failed validation before the pipeline started
    #[error("{0}")]
    Input(#[from] InputError),

    /// Prompt construction failed
    #[error("prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Response parsing failed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// JSON handling error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input validation errors. These are fatal: the pipeline aborts
/// immediately and returns a degraded zero-risk result.
#[derive(Debug, Error)]
pub enum InputError {
    /// No document text was provided
    #[error("Content is required")]
    EmptyContent,

    /// Content hash is not a valid digest
    #[error("invalid content hash: {reason}")]
    InvalidHash { reason: String },

    /// Declared content length disagrees with the text
    #[error("content length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Document exceeds the configured size ceiling
    #[error("content exceeds maximum length: {actual} > {max} characters")]
    Oversized { actual: usize, max: usize },
}

/// Prompt construction errors.
#[derive(Debug, Error)]
pub enum PromptError {
    /// No template registered under the requested id
    #[error("template not found: {id}")]
    TemplateNotFound { id: String },

    /// Template exists but is disabled
    #[error("template disabled: {id}")]
    TemplateDisabled { id: String },

    /// Assembled prompt exceeds the configured ceiling
    #[error("prompt too long: {actual} > {max} characters")]
    TooLong { actual: usize, max: usize },
}

/// Response parsing errors.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No extraction strategy produced a parseable object
    #[error("no parseable analysis found in model response")]
    ExtractionFailed,

    /// Strict mode rejected the parsed object
    #[error("validation rejected the response ({} blocking issue(s))", issues.len())]
    ValidationFailed { issues: Vec<ValidationIssue> },
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
