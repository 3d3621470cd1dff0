//! Model invocation client - retry, backoff, and timeout around a provider.
//!
//! Each attempt races the provider call against a per-attempt timer.
//! Failures back off exponentially (capped) before the next attempt. The
//! whole loop is an explicit state machine driven by a cancellation token:
//! `Idle -> Attempting -> {Succeeded | Backoff -> Attempting | Failed}`.
//! Total wall-clock time is bounded by `max_retries * (timeout + backoff cap)`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::traits::model::{ModelCallError, ModelErrorKind, ModelProvider};
use crate::types::response::RawModelResponse;

/// First backoff delay in milliseconds.
pub const BASE_BACKOFF_MS: u64 = 1_000;

/// Ceiling on any single backoff delay in milliseconds.
pub const BACKOFF_CAP_MS: u64 = 10_000;

/// Options for one invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InvokeOptions {
    /// Maximum attempts (at least 1)
    pub max_retries: u32,

    /// Per-attempt time budget in milliseconds
    pub timeout_ms: u64,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 30_000,
        }
    }
}

impl InvokeOptions {
    /// Create options with the given retry and timeout budget.
    pub fn new(max_retries: u32, timeout_ms: u64) -> Self {
        Self {
            max_retries,
            timeout_ms,
        }
    }
}

/// Invocation loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// No attempt started yet
    Idle,

    /// An attempt is in flight
    Attempting { attempt: u32 },

    /// Sleeping between attempts
    Backoff { attempt: u32, delay_ms: u64 },

    /// Terminal: a reply was obtained
    Succeeded,

    /// Terminal: every attempt failed
    Failed,
}

/// Terminal failure record for an invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationFailure {
    /// Failure category of the last attempt
    pub kind: ModelErrorKind,

    /// Detail of the last attempt's failure
    pub message: String,

    /// How many attempts were made
    pub attempts: u32,
}

impl InvocationFailure {
    /// Stable machine-readable code for the failure category.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Caller-facing description of the failure.
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

/// Outcome of an invocation: either a reply or a structured failure.
///
/// The client never propagates an error past this envelope.
#[derive(Debug, Clone)]
pub enum InvocationOutcome {
    /// A reply was obtained
    Succeeded(RawModelResponse),

    /// Every attempt failed
    Failed(InvocationFailure),
}

impl InvocationOutcome {
    /// Whether the invocation produced a reply.
    pub fn success(&self) -> bool {
        matches!(self, InvocationOutcome::Succeeded(_))
    }

    /// The reply, if any.
    pub fn response(&self) -> Option<&RawModelResponse> {
        match self {
            InvocationOutcome::Succeeded(response) => Some(response),
            InvocationOutcome::Failed(_) => None,
        }
    }

    /// The failure record, if any.
    pub fn failure(&self) -> Option<&InvocationFailure> {
        match self {
            InvocationOutcome::Succeeded(_) => None,
            InvocationOutcome::Failed(failure) => Some(failure),
        }
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<RawModelResponse, InvocationFailure> {
        match self {
            InvocationOutcome::Succeeded(response) => Ok(response),
            InvocationOutcome::Failed(failure) => Err(failure),
        }
    }
}

/// Backoff delay before the attempt following `attempt` (1-based).
///
/// `min(1000 * 2^(attempt-1), 10_000)` milliseconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(10);
    let ms = BASE_BACKOFF_MS.saturating_mul(1 << exp).min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}

/// Wraps a provider with retry, backoff, and per-attempt timeout.
pub struct InvocationClient<P: ModelProvider> {
    provider: P,
}

impl<P: ModelProvider> InvocationClient<P> {
    /// Create a client around a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Invoke the model with retries.
    ///
    /// Returns an envelope instead of an error: terminal failure carries
    /// the classified kind, message, and attempt count. Triggering `cancel`
    /// aborts the in-flight call and skips remaining retries.
    pub async fn invoke(
        &self,
        prompt: &str,
        options: &InvokeOptions,
        cancel: &CancellationToken,
    ) -> InvocationOutcome {
        let max_attempts = options.max_retries.max(1);
        let timeout = Duration::from_millis(options.timeout_ms);
        let mut state = InvocationState::Idle;
        let mut last_error = ModelCallError::new(ModelErrorKind::Other, "no attempt made");
        debug!(provider = self.provider.name(), state = ?state, "invocation starting");

        for attempt in 1..=max_attempts {
            state = InvocationState::Attempting { attempt };
            debug!(provider = self.provider.name(), attempt, state = ?state, "model attempt");

            let attempt_result = tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(attempt, "invocation cancelled");
                    return InvocationOutcome::Failed(InvocationFailure {
                        kind: ModelErrorKind::Cancelled,
                        message: "cancelled before completion".to_string(),
                        attempts: attempt,
                    });
                }
                result = tokio::time::timeout(timeout, self.provider.generate(prompt)) => result,
            };

            match attempt_result {
                Ok(Ok(response)) if !response.text.trim().is_empty() => {
                    state = InvocationState::Succeeded;
                    debug!(
                        attempt,
                        state = ?state,
                        total_tokens = response.usage.total_tokens,
                        finish_reason = ?response.finish_reason,
                        "model reply received"
                    );
                    return InvocationOutcome::Succeeded(response);
                }
                Ok(Ok(_)) => {
                    last_error =
                        ModelCallError::new(ModelErrorKind::Other, "provider returned empty text");
                }
                Ok(Err(error)) => {
                    warn!(attempt, kind = error.kind.code(), error = %error.message, "model attempt failed");
                    let retryable = error.kind.is_retryable();
                    last_error = error;
                    if !retryable {
                        return InvocationOutcome::Failed(InvocationFailure {
                            kind: last_error.kind,
                            message: last_error.message,
                            attempts: attempt,
                        });
                    }
                }
                Err(_elapsed) => {
                    warn!(attempt, timeout_ms = options.timeout_ms, "model attempt timed out");
                    last_error = ModelCallError::new(
                        ModelErrorKind::Timeout,
                        format!("no reply within {} ms", options.timeout_ms),
                    );
                }
            }

            if attempt < max_attempts {
                let delay = backoff_delay(attempt);
                state = InvocationState::Backoff {
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                };
                debug!(attempt, delay_ms = delay.as_millis() as u64, state = ?state, "backing off");

                tokio::select! {
                    _ = cancel.cancelled() => {
                        return InvocationOutcome::Failed(InvocationFailure {
                            kind: ModelErrorKind::Cancelled,
                            message: "cancelled during backoff".to_string(),
                            attempts: attempt,
                        });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        state = InvocationState::Failed;
        warn!(
            attempts = max_attempts,
            kind = last_error.kind.code(),
            state = ?state,
            "invocation exhausted retries"
        );
        InvocationOutcome::Failed(InvocationFailure {
            kind: last_error.kind,
            message: last_error.message,
            attempts: max_attempts,
        })
    }

    /// Minimal single-attempt contract: no retries, no envelope.
    ///
    /// For callers that want the unstructured legacy shape.
    pub async fn raw_invoke(&self, prompt: &str) -> Result<RawModelResponse, ModelCallError> {
        self.provider.generate(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockModel;

    #[test]
    fn test_backoff_delays_are_capped() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(4), Duration::from_millis(8_000));
        assert_eq!(backoff_delay(5), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(9), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let provider = MockModel::new().with_response(r#"{"overallRiskScore": 10}"#);
        let client = InvocationClient::new(provider);

        let outcome = client
            .invoke("prompt", &InvokeOptions::default(), &CancellationToken::new())
            .await;

        assert!(outcome.success());
        assert_eq!(client.provider().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_backoff_total() {
        let provider = MockModel::new().always_failing(ModelErrorKind::Server, "boom");
        let client = InvocationClient::new(provider);
        let options = InvokeOptions::new(3, 1_000);

        let start = tokio::time::Instant::now();
        let outcome = client
            .invoke("prompt", &options, &CancellationToken::new())
            .await;

        // Exactly max_retries attempts, and the elapsed virtual time equals
        // the sum of the capped exponential delays (1s + 2s).
        let failure = outcome.failure().expect("failure");
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.kind, ModelErrorKind::Server);
        assert_eq!(client.provider().call_count(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_classified_and_retried() {
        let provider = MockModel::new()
            .with_delay(Duration::from_secs(60))
            .with_response("late reply");
        let client = InvocationClient::new(provider);
        let options = InvokeOptions::new(2, 100);

        let outcome = client
            .invoke("prompt", &options, &CancellationToken::new())
            .await;

        let failure = outcome.failure().expect("failure");
        assert_eq!(failure.kind, ModelErrorKind::Timeout);
        assert_eq!(failure.attempts, 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_short_circuits() {
        let provider = MockModel::new().always_failing(ModelErrorKind::Forbidden, "bad key");
        let client = InvocationClient::new(provider);
        let options = InvokeOptions::new(5, 1_000);

        let outcome = client
            .invoke("prompt", &options, &CancellationToken::new())
            .await;

        let failure = outcome.failure().expect("failure");
        assert_eq!(failure.kind, ModelErrorKind::Forbidden);
        assert_eq!(failure.attempts, 1);
        assert_eq!(client.provider().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_skips_remaining_retries() {
        let provider = MockModel::new().always_failing(ModelErrorKind::Server, "boom");
        let client = InvocationClient::new(provider);
        let options = InvokeOptions::new(5, 1_000);

        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel_clone.cancel();
        });

        let outcome = client.invoke("prompt", &options, &cancel).await;

        let failure = outcome.failure().expect("failure");
        assert_eq!(failure.kind, ModelErrorKind::Cancelled);
        assert!(failure.attempts < 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_reply_is_a_failure() {
        let provider = MockModel::new()
            .with_response("")
            .with_response("  ")
            .always_failing(ModelErrorKind::Server, "exhausted script");
        let client = InvocationClient::new(provider);
        let options = InvokeOptions::new(2, 1_000);

        let outcome = client
            .invoke("prompt", &options, &CancellationToken::new())
            .await;

        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_raw_invoke_single_attempt() {
        let provider = MockModel::new().with_response("reply text");
        let client = InvocationClient::new(provider);

        let response = client.raw_invoke("prompt").await.unwrap();
        assert_eq!(response.text, "reply text");
        assert_eq!(client.provider().call_count(), 1);
    }
}
