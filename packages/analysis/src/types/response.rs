//! Model response envelope types.

use serde::{Deserialize, Serialize};

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// Normal completion (default for unrecognized provider values)
    #[default]
    Stop,

    /// Output truncated at the token limit
    Length,

    /// Generation stopped by a safety filter
    Safety,

    /// Generation stopped for reciting training data
    Recitation,
}

impl FinishReason {
    /// Normalize a provider-reported finish reason.
    ///
    /// Unrecognized or absent values default to `Stop`.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_uppercase()).as_deref() {
            Some("STOP") | None => FinishReason::Stop,
            Some("LENGTH") | Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => FinishReason::Safety,
            Some("RECITATION") => FinishReason::Recitation,
            Some(_) => FinishReason::Stop,
        }
    }
}

/// Token accounting for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the generated reply
    pub completion_tokens: u32,

    /// Total tokens used
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create a usage record.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// The opaque reply from the external generative service.
///
/// Created fresh for every invocation and discarded once parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawModelResponse {
    /// Untrusted free-form reply text
    pub text: String,

    /// Token accounting
    #[serde(default)]
    pub usage: TokenUsage,

    /// Normalized finish reason
    #[serde(default)]
    pub finish_reason: FinishReason,
}

impl RawModelResponse {
    /// Create a response with zero usage and a normal stop.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// Set the usage counters.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the finish reason.
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }
}
