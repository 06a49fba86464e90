pub mod facade;
pub mod fixed_window;
pub mod key;
pub mod token_bucket;

use crate::errors::Result;
use async_trait::async_trait;

pub use facade::RateLimiter;
pub use fixed_window::FixedWindow;
pub use key::RateLimitKey;
pub use token_bucket::TokenBucket;

/// Response from a rate limit check
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Tokens left (token bucket) or requests left in the window (fixed window)
    pub remaining: f64,
}

/// Snapshot of an identity's quota without consuming from it
#[derive(Debug, Clone, PartialEq)]
pub struct LimitStatus {
    /// Whether the store currently holds state for the identity
    pub tracked: bool,

    /// What a request made now would have available
    pub remaining: f64,
}

/// A rate limiting algorithm evaluated against the shared store
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decide one request for `key` at `now` (seconds) as a single atomic store operation
    async fn decide(&self, key: &RateLimitKey, now: f64) -> Result<Decision>;

    /// Read-only snapshot; not atomic with concurrent decisions
    async fn status(&self, key: &RateLimitKey, now: f64) -> Result<LimitStatus>;
}
