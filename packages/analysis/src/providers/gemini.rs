//! Gemini implementation of the ModelProvider trait.
//!
//! A reference implementation adapting the pure `gemini-client` crate and
//! classifying its transport errors into the actionable categories the
//! invocation client retries on.
//!
//! # Example
//!
//! ```rust,ignore
//! use analysis::providers::GeminiProvider;
//! use analysis::security::ModelCredentials;
//!
//! let provider = GeminiProvider::new(
//!     ModelCredentials::new("api-key", "gemini-2.0-flash"),
//! );
//! let analyzer = Analyzer::new(provider);
//! ```

use async_trait::async_trait;
use gemini_client::{GeminiClient, GeminiError, GenerateRequest, GenerationConfig};

use crate::security::ModelCredentials;
use crate::traits::model::{ModelCallError, ModelErrorKind, ModelProvider};
use crate::types::response::{FinishReason, RawModelResponse, TokenUsage};

/// Gemini-backed model provider.
pub struct GeminiProvider {
    client: GeminiClient,
    model: String,
    max_output_tokens: u32,
}

impl GeminiProvider {
    /// Create a provider from credentials.
    pub fn new(credentials: ModelCredentials) -> Self {
        let mut client = GeminiClient::new(credentials.api_key.expose());
        if let Some(base_url) = &credentials.base_url {
            client = client.with_base_url(base_url);
        }
        Self {
            client,
            model: credentials.model,
            max_output_tokens: 4_096,
        }
    }

    /// Create from environment variable `GEMINI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ModelCallError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            ModelCallError::new(ModelErrorKind::Forbidden, "GEMINI_API_KEY not set")
        })?;
        Ok(Self::new(ModelCredentials::new(api_key, model)))
    }

    /// Set the output token ceiling (default: 4096).
    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    /// Get the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<RawModelResponse, ModelCallError> {
        let request = GenerateRequest::from_prompt(prompt).with_config(GenerationConfig {
            temperature: Some(0.0),
            max_output_tokens: Some(self.max_output_tokens),
            response_mime_type: Some("application/json".to_string()),
        });

        let response = self
            .client
            .generate_content(&self.model, &request)
            .await
            .map_err(classify_error)?;

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();
        let finish_reason = FinishReason::from_provider(response.finish_reason());
        let text = response.text().unwrap_or_default();

        Ok(RawModelResponse {
            text,
            usage,
            finish_reason,
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Classify a Gemini transport error into an actionable category.
fn classify_error(error: GeminiError) -> ModelCallError {
    let kind = match &error {
        GeminiError::Api { status, message } => classify_status(*status, message),
        GeminiError::Blocked { .. } => ModelErrorKind::SafetyFiltered,
        GeminiError::Network(_) => ModelErrorKind::Network,
        GeminiError::Config(_) => ModelErrorKind::Forbidden,
        GeminiError::Parse(_) => ModelErrorKind::Other,
    };
    ModelCallError::new(kind, error.to_string())
}

/// Map an HTTP status (plus message detail) onto an error category.
fn classify_status(status: u16, message: &str) -> ModelErrorKind {
    match status {
        429 if message.to_lowercase().contains("quota") => ModelErrorKind::QuotaExceeded,
        429 => ModelErrorKind::RateLimited,
        401 | 403 => ModelErrorKind::Forbidden,
        400 => ModelErrorKind::BadRequest,
        500..=599 => ModelErrorKind::Server,
        _ => ModelErrorKind::Other,
    }
}
