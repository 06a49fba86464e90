//! Single-process store with the same observable semantics as `RedisStore`.
//!
//! Values are strings, expiry is lazy and driven by the injected [`Clock`], and
//! each atomic operation runs under one lock. Only useful where every caller
//! shares the process: tests and single-node development.

use crate::clock::{Clock, SystemClock};
use crate::errors::{RateLimitError, Result};
use crate::limiter::fixed_window::parse_counter;
use crate::limiter::token_bucket::{parse_level, refill, take_token};
use crate::store::{AtomicOp, ScriptResponse, Store};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<f64>,
}

pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !is_expired(entry, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seconds until `key` expires; `None` when absent or persistent
    pub fn ttl(&self, key: &str) -> Option<f64> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        live(&mut entries, key, now).and_then(|entry| entry.expires_at.map(|at| at - now))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(entry: &Entry, now: f64) -> bool {
    entry.expires_at.is_some_and(|at| now >= at)
}

/// Look up a key, dropping it first if its expiry has passed
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str, now: f64) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|entry| is_expired(entry, now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

/// Parse an integer the way Redis INCR does: optional minus sign, no plus
/// sign, no leading zeros, no surrounding whitespace
fn parse_integer(raw: &str) -> Option<i64> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let canonical = match digits.as_bytes() {
        [] => false,
        [b'0'] => raw == "0",
        [first, rest @ ..] => {
            matches!(*first, b'1'..=b'9') && rest.iter().all(|b| b.is_ascii_digit())
        }
    };
    if !canonical {
        return None;
    }
    raw.parse().ok()
}

fn write(entries: &mut HashMap<String, Entry>, key: &str, value: String, expires_at: Option<f64>) {
    entries.insert(key.to_string(), Entry { value, expires_at });
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Ok(live(&mut entries, key, now).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        write(
            &mut entries,
            key,
            value.to_string(),
            ttl_secs.map(|ttl| now + ttl as f64),
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match live(&mut entries, key, now) {
            Some(entry) => {
                let current = parse_integer(&entry.value).ok_or_else(|| {
                    RateLimitError::StoreCommandError(
                        "value is not an integer or out of range".to_string(),
                    )
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    RateLimitError::StoreCommandError("increment would overflow".to_string())
                })?;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                write(&mut entries, key, "1".to_string(), None);
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Ok(match live(&mut entries, key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + seconds as f64);
                true
            }
            None => false,
        })
    }

    async fn execute_atomic(&self, op: &AtomicOp<'_>) -> Result<ScriptResponse> {
        let clock_now = self.clock.now();
        let mut entries = self.entries.lock();

        let response = match *op {
            AtomicOp::TokenBucket {
                tokens_key,
                timestamp_key,
                rate,
                capacity,
                now,
                idle_ttl_secs,
            } => {
                let last_update = live(&mut entries, timestamp_key, clock_now)
                    .and_then(|entry| parse_level(&entry.value));
                let tokens = live(&mut entries, tokens_key, clock_now)
                    .and_then(|entry| parse_level(&entry.value));

                let filled = refill(tokens, last_update, now, rate, capacity);
                let (allowed, remaining) = take_token(filled);

                let expires_at = Some(clock_now + idle_ttl_secs as f64);
                write(&mut entries, tokens_key, remaining.to_string(), expires_at);
                write(&mut entries, timestamp_key, now.to_string(), expires_at);

                ScriptResponse {
                    allowed,
                    level: remaining,
                }
            }
            AtomicOp::FixedWindow {
                counter_key,
                limit,
                window_secs,
            } => {
                let window_end = clock_now + window_secs as f64;
                let current = live(&mut entries, counter_key, clock_now)
                    .map(|entry| parse_counter(&entry.value));

                let count = match current {
                    Some(Some(current)) => {
                        let count = current.saturating_add(1);
                        if let Some(entry) = entries.get_mut(counter_key) {
                            entry.value = count.to_string();
                            // Expiry stays where the window's first request put it
                            if count == 1 {
                                entry.expires_at = Some(window_end);
                            }
                        }
                        count
                    }
                    // Absent, or not a counter we wrote: start a fresh window
                    _ => {
                        write(&mut entries, counter_key, "1".to_string(), Some(window_end));
                        1
                    }
                };

                ScriptResponse {
                    allowed: count <= limit,
                    level: count as f64,
                }
            }
        };

        debug!(
            "Memory store {} result: allowed={}, level={:.3}",
            op.name(),
            response.allowed,
            response.level
        );

        Ok(response)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_at(start: f64) -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(start));
        let store = MemoryStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_set_with_ttl_expires() {
        let (clock, store) = store_at(0.0);

        store.set("k", "v", Some(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(9.5);
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(0.5);
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_incr_and_expire() {
        let (clock, store) = store_at(0.0);

        assert_eq!(store.incr("counter").await.unwrap(), 1);
        assert_eq!(store.incr("counter").await.unwrap(), 2);
        assert!(store.ttl("counter").is_none());

        assert!(store.expire("counter", 5).await.unwrap());
        assert_eq!(store.ttl("counter"), Some(5.0));
        assert!(!store.expire("missing", 5).await.unwrap());

        clock.advance(5.0);
        assert_eq!(store.incr("counter").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let (_clock, store) = store_at(0.0);
        store.set("k", "abc", None).await.unwrap();

        let err = store.incr("k").await.unwrap_err();
        assert!(matches!(err, RateLimitError::StoreCommandError(_)));

        for raw in ["007", "-0", "+5", " 5"] {
            store.set("k", raw, None).await.unwrap();
            assert!(store.incr("k").await.is_err(), "{:?} was incremented", raw);
        }

        store.set("k", "-3", None).await.unwrap();
        assert_eq!(store.incr("k").await.unwrap(), -2);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("0"), Some(0));
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-42"), Some(-42));
        assert_eq!(parse_integer("007"), None);
        assert_eq!(parse_integer("-"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("99999999999999999999"), None);
    }

    #[tokio::test]
    async fn test_fixed_window_op_keeps_first_expiry() {
        let (clock, store) = store_at(0.0);
        let op = AtomicOp::FixedWindow {
            counter_key: "fw",
            limit: 3,
            window_secs: 60,
        };

        store.execute_atomic(&op).await.unwrap();
        clock.advance(30.0);
        let response = store.execute_atomic(&op).await.unwrap();

        assert_eq!(response.level, 2.0);
        assert_eq!(store.ttl("fw"), Some(30.0));
    }

    #[tokio::test]
    async fn test_token_bucket_op_with_negative_capacity_denies() {
        let (_clock, store) = store_at(0.0);
        let op = AtomicOp::TokenBucket {
            tokens_key: "neg:tokens",
            timestamp_key: "neg:ts",
            rate: 1.0,
            capacity: -5.0,
            now: 10.0,
            idle_ttl_secs: 60,
        };

        let response = store.execute_atomic(&op).await.unwrap();
        assert!(!response.allowed);
        assert_eq!(response.level, 0.0);
    }

    #[tokio::test]
    async fn test_token_bucket_op_refreshes_both_keys() {
        let (clock, store) = store_at(100.0);
        let op = |now| AtomicOp::TokenBucket {
            tokens_key: "tb:tokens",
            timestamp_key: "tb:ts",
            rate: 1.0,
            capacity: 5.0,
            now,
            idle_ttl_secs: 60,
        };

        store.execute_atomic(&op(100.0)).await.unwrap();
        clock.advance(40.0);
        store.execute_atomic(&op(140.0)).await.unwrap();

        assert_eq!(store.ttl("tb:tokens"), Some(60.0));
        assert_eq!(store.ttl("tb:ts"), Some(60.0));

        clock.advance(60.0);
        assert!(store.is_empty());
    }
}
