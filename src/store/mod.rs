//! Shared state store boundary.
//!
//! All limiter state lives behind [`Store`]; the engine keeps nothing between
//! requests. Every decision is a single [`Store::execute_atomic`] call, which
//! the store must run as one indivisible step per key.

pub mod memory;
pub mod pool;
pub mod redis_store;
pub mod script;

use crate::errors::Result;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// A read-modify-write step the store executes atomically.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicOp<'a> {
    /// Refill, try to take one token, persist, refresh idle expiry on both keys.
    TokenBucket {
        tokens_key: &'a str,
        timestamp_key: &'a str,
        rate: f64,
        capacity: f64,
        now: f64,
        idle_ttl_secs: u64,
    },

    /// Increment the window counter; start its expiry when the increment created it.
    FixedWindow {
        counter_key: &'a str,
        limit: u64,
        window_secs: u64,
    },
}

impl AtomicOp<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            AtomicOp::TokenBucket { .. } => "token_bucket",
            AtomicOp::FixedWindow { .. } => "fixed_window",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptResponse {
    /// Whether request was allowed (1) or denied (0)
    pub allowed: bool,

    /// Tokens left after the decision (token bucket) or the post-increment count (fixed window)
    pub level: f64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Read a raw value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value, optionally expiring after `ttl_secs`
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()>;

    /// Atomically increment an integer value, creating it at 1 when absent
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Set a key's expiry; returns false when the key does not exist
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// Run a compound operation as one indivisible step
    async fn execute_atomic(&self, op: &AtomicOp<'_>) -> Result<ScriptResponse>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<()>;
}
