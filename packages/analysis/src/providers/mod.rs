//! Model provider implementations and decorators.

pub mod rate_limited;

#[cfg(feature = "gemini")]
pub mod gemini;

pub use rate_limited::{ProviderExt, RateLimitedProvider};

#[cfg(feature = "gemini")]
pub use gemini::GeminiProvider;
