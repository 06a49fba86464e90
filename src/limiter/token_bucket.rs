//! Continuous-refill token bucket.
//!
//! State per identity is two keys, `<key>:tokens` and `<key>:ts`, read and
//! rewritten together by one atomic store operation. A missing bucket starts
//! full. Denied requests are not charged, but their elapsed time is still
//! credited and `last_update` still advances, so a denial neither loses nor
//! gains credit.
//!
//! The functions below are the reference arithmetic. `scripts/token_bucket.lua`
//! performs the same steps server-side in Redis.

use crate::config::validator::validate_token_bucket;
use crate::config::TokenBucketConfig;
use crate::errors::Result;
use crate::limiter::{Decision, LimitStatus, RateLimitKey, Strategy};
use crate::store::{AtomicOp, Store};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const TOKENS_SUFFIX: &str = "tokens";
const TIMESTAMP_SUFFIX: &str = "ts";

/// Parse a stored decimal number. Anything else (hex included) or non-finite
/// reads as absent.
pub(crate) fn parse_level(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Tokens available at `now`, before taking one.
///
/// Absent tokens mean a full bucket and an absent timestamp means 0. Stored
/// tokens outside `[0, capacity]` are clamped back into range, and a clock
/// that moved backwards refills nothing.
pub(crate) fn refill(
    tokens: Option<f64>,
    last_update: Option<f64>,
    now: f64,
    rate: f64,
    capacity: f64,
) -> f64 {
    // A negative or NaN capacity holds nothing
    let capacity = capacity.max(0.0);
    let last_update = last_update.unwrap_or(0.0);
    let tokens = tokens.unwrap_or(capacity).clamp(0.0, capacity);
    let elapsed = (now - last_update).max(0.0);
    (tokens + elapsed * rate).min(capacity)
}

/// Take one token if available; returns `(allowed, tokens left)`
pub(crate) fn take_token(filled: f64) -> (bool, f64) {
    if filled >= 1.0 {
        (true, filled - 1.0)
    } else {
        (false, filled)
    }
}

pub struct TokenBucket<S: Store> {
    store: Arc<S>,
    rate: f64,
    capacity: f64,
    idle_ttl_secs: u64,
}

impl<S: Store> TokenBucket<S> {
    /// Create a new token bucket; invalid parameters fail here, never at decision time
    pub fn new(store: Arc<S>, config: &TokenBucketConfig) -> Result<Self> {
        validate_token_bucket(config)?;
        Ok(Self {
            store,
            rate: config.rate,
            capacity: config.capacity,
            idle_ttl_secs: config.idle_ttl_secs,
        })
    }
}

#[async_trait]
impl<S: Store + 'static> Strategy for TokenBucket<S> {
    fn name(&self) -> &'static str {
        "token_bucket"
    }

    async fn decide(&self, key: &RateLimitKey, now: f64) -> Result<Decision> {
        let tokens_key = key.with_suffix(TOKENS_SUFFIX);
        let timestamp_key = key.with_suffix(TIMESTAMP_SUFFIX);

        let response = self
            .store
            .execute_atomic(&AtomicOp::TokenBucket {
                tokens_key: &tokens_key,
                timestamp_key: &timestamp_key,
                rate: self.rate,
                capacity: self.capacity,
                now,
                idle_ttl_secs: self.idle_ttl_secs,
            })
            .await?;

        Ok(Decision {
            allowed: response.allowed,
            remaining: response.level,
        })
    }

    async fn status(&self, key: &RateLimitKey, now: f64) -> Result<LimitStatus> {
        let tokens = self.store.get(&key.with_suffix(TOKENS_SUFFIX)).await?;
        let last_update = self.store.get(&key.with_suffix(TIMESTAMP_SUFFIX)).await?;
        let tracked = tokens.is_some() || last_update.is_some();

        let remaining = refill(
            tokens.as_deref().and_then(parse_level),
            last_update.as_deref().and_then(parse_level),
            now,
            self.rate,
            self.capacity,
        );

        debug!("Bucket status for {}: tracked={}, remaining={:.3}", key, tracked, remaining);

        Ok(LimitStatus { tracked, remaining })
    }
}
