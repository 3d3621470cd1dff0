//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the analysis library
//! without making real model or network calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::traits::model::{ModelCallError, ModelErrorKind, ModelProvider};
use crate::types::response::RawModelResponse;

/// Canned reply used when a mock has no scripted outcomes left.
pub const DEFAULT_MOCK_REPLY: &str = r#"{
  "overallRiskScore": 55,
  "riskLevel": "medium",
  "confidenceScore": 80,
  "riskAssessments": [
    {
      "category": "account-termination",
      "riskLevel": "high",
      "riskScore": 70,
      "confidenceScore": 85,
      "summary": "Account can be terminated without notice",
      "rationale": "The provider reserves unilateral termination rights.",
      "suggestedAction": "Ask for a notice period",
      "startPosition": 0,
      "endPosition": 40
    }
  ]
}"#;

/// A mock model provider for testing.
///
/// Returns scripted outcomes in order, then a configurable fallback, then
/// a deterministic canned reply. Records every prompt for assertions.
#[derive(Default)]
pub struct MockModel {
    /// Scripted outcomes, consumed front to back
    script: Arc<Mutex<VecDeque<Result<RawModelResponse, ModelCallError>>>>,

    /// Outcome returned once the script is exhausted
    fallback: Arc<RwLock<Option<Result<RawModelResponse, ModelCallError>>>>,

    /// Artificial latency before each reply
    delay: Option<Duration>,

    /// Prompts received, for assertions
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockModel {
    /// Create a mock with no script: every call returns the canned reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful text reply.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(RawModelResponse::new(text)));
        self
    }

    /// Queue a full response envelope.
    pub fn with_raw_response(self, response: RawModelResponse) -> Self {
        self.script.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Queue a classified failure.
    pub fn with_failure(self, kind: ModelErrorKind, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(ModelCallError::new(kind, message)));
        self
    }

    /// Fail every call once the script is exhausted.
    pub fn always_failing(self, kind: ModelErrorKind, message: impl Into<String>) -> Self {
        *self.fallback.write().unwrap() = Some(Err(ModelCallError::new(kind, message)));
        self
    }

    /// Reply with the given text once the script is exhausted.
    pub fn always_replying(self, text: impl Into<String>) -> Self {
        *self.fallback.write().unwrap() = Some(Ok(RawModelResponse::new(text)));
        self
    }

    /// Sleep before every reply (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All prompts received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Clear the recorded calls.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl ModelProvider for MockModel {
    async fn generate(&self, prompt: &str) -> Result<RawModelResponse, ModelCallError> {
        self.calls.write().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }

        if let Some(fallback) = self.fallback.read().unwrap().as_ref() {
            return fallback.clone();
        }

        Ok(RawModelResponse::new(DEFAULT_MOCK_REPLY))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_then_fallback() {
        let mock = MockModel::new()
            .with_response("first")
            .with_failure(ModelErrorKind::Server, "second fails")
            .always_replying("fallback");

        assert_eq!(mock.generate("a").await.unwrap().text, "first");
        assert!(mock.generate("b").await.is_err());
        assert_eq!(mock.generate("c").await.unwrap().text, "fallback");
        assert_eq!(mock.generate("d").await.unwrap().text, "fallback");
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test]
    async fn test_default_reply_is_valid_json() {
        let mock = MockModel::new();
        let response = mock.generate("prompt").await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&response.text).unwrap();
        assert_eq!(value["overallRiskScore"], 55);
        assert!(value["riskAssessments"].is_array());
    }

    #[tokio::test]
    async fn test_records_prompts() {
        let mock = MockModel::new();
        mock.generate("hello world").await.unwrap();

        assert_eq!(mock.calls(), vec!["hello world".to_string()]);
        mock.clear_calls();
        assert_eq!(mock.call_count(), 0);
    }
}
