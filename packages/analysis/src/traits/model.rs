//! Model provider trait - the seam to the external generative service.
//!
//! Implementations wrap a specific provider (Gemini, a proxy, a mock) and
//! handle transport; retry, backoff, and timeout policy live in the
//! invocation client, not in providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::response::RawModelResponse;

/// A generative-text backend.
///
/// One call, one prompt string in, one raw response envelope out. Errors
/// must be classified so callers can decide whether to retry and what to
/// tell the user.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a reply for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<RawModelResponse, ModelCallError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str {
        "model"
    }
}

/// Actionable categories of provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    /// Too many requests; retry after a delay
    RateLimited,

    /// Billing or usage quota exhausted
    QuotaExceeded,

    /// Authentication or authorization failure
    Forbidden,

    /// The request itself was malformed
    BadRequest,

    /// Provider-side failure (5xx)
    Server,

    /// The prompt or reply was blocked by a safety filter
    SafetyFiltered,

    /// The attempt exceeded its time budget
    Timeout,

    /// Transport failure (connection, DNS, TLS)
    Network,

    /// The caller cancelled the operation
    Cancelled,

    /// Anything that does not fit the categories above
    Other,
}

impl ModelErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            ModelErrorKind::RateLimited => "rate_limited",
            ModelErrorKind::QuotaExceeded => "quota_exceeded",
            ModelErrorKind::Forbidden => "forbidden",
            ModelErrorKind::BadRequest => "bad_request",
            ModelErrorKind::Server => "server_error",
            ModelErrorKind::SafetyFiltered => "safety_filtered",
            ModelErrorKind::Timeout => "timeout",
            ModelErrorKind::Network => "network",
            ModelErrorKind::Cancelled => "cancelled",
            ModelErrorKind::Other => "error",
        }
    }

    /// Caller-facing description of the failure.
    pub fn user_message(self) -> &'static str {
        match self {
            ModelErrorKind::RateLimited => {
                "The analysis service is receiving too many requests. Try again shortly."
            }
            ModelErrorKind::QuotaExceeded => {
                "The analysis quota has been exhausted. Try again later."
            }
            ModelErrorKind::Forbidden => {
                "The analysis service rejected the request credentials."
            }
            ModelErrorKind::BadRequest => {
                "The analysis request was malformed and could not be processed."
            }
            ModelErrorKind::Server => {
                "The analysis service encountered an internal problem."
            }
            ModelErrorKind::SafetyFiltered => {
                "The document triggered the provider's content filters."
            }
            ModelErrorKind::Timeout => "The analysis service did not respond in time.",
            ModelErrorKind::Network => "The analysis service could not be reached.",
            ModelErrorKind::Cancelled => "The analysis was cancelled.",
            ModelErrorKind::Other => "The analysis service returned an unexpected error.",
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ModelErrorKind::RateLimited
                | ModelErrorKind::Server
                | ModelErrorKind::Timeout
                | ModelErrorKind::Network
                | ModelErrorKind::Other
        )
    }
}

/// A classified provider failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{}: {message}", kind.code())]
pub struct ModelCallError {
    /// Failure category
    pub kind: ModelErrorKind,

    /// Provider-reported detail
    pub message: String,
}

impl ModelCallError {
    /// Create a classified error.
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ModelErrorKind::RateLimited.is_retryable());
        assert!(ModelErrorKind::Server.is_retryable());
        assert!(ModelErrorKind::Timeout.is_retryable());
        assert!(!ModelErrorKind::Forbidden.is_retryable());
        assert!(!ModelErrorKind::BadRequest.is_retryable());
        assert!(!ModelErrorKind::SafetyFiltered.is_retryable());
        assert!(!ModelErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display_uses_code() {
        let error = ModelCallError::new(ModelErrorKind::RateLimited, "429 from upstream");
        assert_eq!(error.to_string(), "rate_limited: 429 from upstream");
    }
}
