//! Fixed window counter.
//!
//! A window opens with the first request for an identity and lasts
//! `window_secs` from there; it is not aligned to the wall clock. The counter
//! keeps incrementing past the limit, so only the decision is meaningful, not
//! the stored count.
//!
//! Up to `2 * limit` requests can pass in a short span straddling the end of
//! one window and the start of the next. That is a property of fixed windows
//! and is left as is.

use crate::config::validator::validate_fixed_window;
use crate::config::FixedWindowConfig;
use crate::errors::Result;
use crate::limiter::{Decision, LimitStatus, RateLimitKey, Strategy};
use crate::store::{AtomicOp, Store};
use async_trait::async_trait;
use std::sync::Arc;

const COUNTER_SUFFIX: &str = "fw";

/// Parse a stored counter. Only canonical non-negative integers count (no
/// sign, no leading zeros, at most 18 digits), matching what Redis INCR
/// accepts; anything else restarts the window.
pub(crate) fn parse_counter(raw: &str) -> Option<u64> {
    let canonical = raw == "0"
        || (raw.len() <= 18
            && raw.starts_with(|c: char| matches!(c, '1'..='9'))
            && raw.bytes().all(|b| b.is_ascii_digit()));
    if !canonical {
        return None;
    }
    raw.parse().ok()
}

pub struct FixedWindow<S: Store> {
    store: Arc<S>,
    limit: u64,
    window_secs: u64,
}

impl<S: Store> FixedWindow<S> {
    pub fn new(store: Arc<S>, config: &FixedWindowConfig) -> Result<Self> {
        validate_fixed_window(config)?;
        Ok(Self {
            store,
            limit: config.limit,
            window_secs: config.window_secs,
        })
    }

    fn remaining(&self, count: u64) -> f64 {
        self.limit.saturating_sub(count) as f64
    }
}

#[async_trait]
impl<S: Store + 'static> Strategy for FixedWindow<S> {
    fn name(&self) -> &'static str {
        "fixed_window"
    }

    async fn decide(&self, key: &RateLimitKey, _now: f64) -> Result<Decision> {
        let counter_key = key.with_suffix(COUNTER_SUFFIX);

        let response = self
            .store
            .execute_atomic(&AtomicOp::FixedWindow {
                counter_key: &counter_key,
                limit: self.limit,
                window_secs: self.window_secs,
            })
            .await?;

        Ok(Decision {
            allowed: response.allowed,
            remaining: self.remaining(response.level as u64),
        })
    }

    async fn status(&self, key: &RateLimitKey, _now: f64) -> Result<LimitStatus> {
        let raw = self.store.get(&key.with_suffix(COUNTER_SUFFIX)).await?;
        let count = raw.as_deref().and_then(parse_counter).unwrap_or(0);

        Ok(LimitStatus {
            tracked: raw.is_some(),
            remaining: self.remaining(count),
        })
    }
}
