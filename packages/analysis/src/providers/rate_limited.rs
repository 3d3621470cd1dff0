//! Rate-limited provider wrapper.
//!
//! Wraps any ModelProvider implementation with rate limiting using the
//! governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::traits::model::{ModelCallError, ModelProvider};
use crate::types::response::RawModelResponse;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A provider wrapper that enforces rate limits.
///
/// Uses the governor crate for precise rate limiting with burst support.
pub struct RateLimitedProvider<P: ModelProvider> {
    inner: P,
    limiter: Arc<DefaultRateLimiter>,
}

impl<P: ModelProvider> RateLimitedProvider<P> {
    /// Create a new rate-limited provider.
    ///
    /// # Arguments
    /// * `provider` - The underlying provider to wrap
    /// * `requests_per_second` - Maximum requests per second
    pub fn new(provider: P, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        Self {
            inner: provider,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with a custom quota.
    pub fn with_quota(provider: P, quota: Quota) -> Self {
        Self {
            inner: provider,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with burst support.
    pub fn with_burst(provider: P, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        )
        .allow_burst(NonZeroU32::new(burst).expect("burst must be > 0"));

        Self {
            inner: provider,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Get a reference to the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ModelProvider> ModelProvider for RateLimitedProvider<P> {
    async fn generate(&self, prompt: &str) -> Result<RawModelResponse, ModelCallError> {
        self.limiter.until_ready().await;
        self.inner.generate(prompt).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for easy rate limiting.
pub trait ProviderExt: ModelProvider + Sized {
    /// Wrap this provider with rate limiting.
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedProvider<Self> {
        RateLimitedProvider::new(self, requests_per_second)
    }

    /// Wrap with rate limiting and burst support.
    fn rate_limited_with_burst(
        self,
        requests_per_second: u32,
        burst: u32,
    ) -> RateLimitedProvider<Self> {
        RateLimitedProvider::with_burst(self, requests_per_second, burst)
    }
}

// Implement for all providers
impl<P: ModelProvider + Sized> ProviderExt for P {}
