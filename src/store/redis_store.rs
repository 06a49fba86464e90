use crate::config::RedisConfig;
use crate::errors::{RateLimitError, Result};
use crate::metrics;
use crate::store::pool::{get_pool_stats, PoolStats};
use crate::store::script::LimiterScripts;
use crate::store::{AtomicOp, ScriptResponse, Store};
use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, RedisError};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Redis-backed store. Atomic operations run as server-side Lua scripts.
pub struct RedisStore {
    pool: Pool,
    scripts: LimiterScripts,
    command_timeout: Duration,
}

impl RedisStore {
    /// Create a new store and register the limiter scripts
    pub async fn new(pool: Pool, config: &RedisConfig) -> Result<Self> {
        let store = Self {
            pool,
            scripts: LimiterScripts::new(),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        };

        let mut conn = store.connection().await?;
        store.scripts.load(&mut *conn).await?;

        Ok(store)
    }

    pub fn pool_stats(&self) -> PoolStats {
        get_pool_stats(&self.pool)
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| {
            error!("Failed to get Redis connection: {}", e);
            metrics::record_store_error("pool");
            RateLimitError::StoreUnavailable(format!("Redis pool: {}", e))
        })
    }

    /// Bound a Redis round trip by the command timeout and record its latency
    async fn timed<T, F>(&self, command: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, RedisError>>,
    {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.command_timeout, fut).await;
        metrics::record_store_duration(command, start.elapsed().as_secs_f64());

        let result = match outcome {
            Ok(result) => result.map_err(classify_redis_error),
            Err(_) => Err(RateLimitError::StoreTimeout(self.command_timeout)),
        };

        if let Err(e) = &result {
            error!("Redis {} failed: {}", command, e);
            metrics::record_store_error(e.kind());
        }
        result
    }
}

/// Connection-level failures become `StoreUnavailable`; everything else is a command error.
fn classify_redis_error(e: RedisError) -> RateLimitError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        RateLimitError::StoreUnavailable(e.to_string())
    } else {
        RateLimitError::RedisError(e)
    }
}

/// Parse a script reply of the form `[allowed, level]`
fn parse_script_reply(reply: &[redis::Value]) -> Result<ScriptResponse> {
    if reply.len() != 2 {
        return Err(RateLimitError::ScriptExecutionError(format!(
            "Invalid script response length: {}",
            reply.len()
        )));
    }

    let allowed = match &reply[0] {
        redis::Value::Int(v) => *v == 1,
        other => {
            return Err(RateLimitError::ScriptExecutionError(format!(
                "Invalid allowed value type: {:?}",
                other
            )))
        }
    };

    let level = match &reply[1] {
        redis::Value::Int(v) => *v as f64,
        redis::Value::BulkString(bytes) => std::str::from_utf8(bytes)
            .map_err(|e| {
                RateLimitError::ScriptExecutionError(format!("Invalid UTF-8 in level: {}", e))
            })?
            .parse::<f64>()
            .map_err(|e| {
                RateLimitError::ScriptExecutionError(format!("Failed to parse level: {}", e))
            })?,
        other => {
            return Err(RateLimitError::ScriptExecutionError(format!(
                "Invalid level value type: {:?}",
                other
            )))
        }
    };

    Ok(ScriptResponse { allowed, level })
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        self.timed("get", conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        let mut conn = self.connection().await?;
        match ttl_secs {
            Some(ttl) => self.timed("set", conn.set_ex(key, value, ttl)).await,
            None => self.timed("set", conn.set(key, value)).await,
        }
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.connection().await?;
        self.timed("incr", conn.incr(key, 1i64)).await
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut conn = self.connection().await?;
        let seconds = i64::try_from(seconds).map_err(|_| {
            RateLimitError::StoreCommandError(format!("expiry out of range: {}", seconds))
        })?;
        self.timed("expire", conn.expire(key, seconds)).await
    }

    async fn execute_atomic(&self, op: &AtomicOp<'_>) -> Result<ScriptResponse> {
        let mut conn = self.connection().await?;

        let invocation = match op {
            AtomicOp::TokenBucket {
                tokens_key,
                timestamp_key,
                rate,
                capacity,
                now,
                idle_ttl_secs,
            } => {
                let mut invocation = self.scripts.token_bucket.key(*tokens_key);
                invocation
                    .key(*timestamp_key)
                    .arg(rate.to_string())
                    .arg(capacity.to_string())
                    .arg(now.to_string())
                    .arg(*idle_ttl_secs);
                invocation
            }
            AtomicOp::FixedWindow {
                counter_key,
                limit,
                window_secs,
            } => {
                let mut invocation = self.scripts.fixed_window.key(*counter_key);
                invocation.arg(*limit).arg(*window_secs);
                invocation
            }
        };

        debug!("Executing {} script", op.name());

        let reply: Result<Vec<redis::Value>> = self
            .timed("evalsha", invocation.invoke_async(&mut *conn))
            .await;

        let response = reply.and_then(|values| parse_script_reply(&values));
        metrics::record_script_execution(op.name(), response.is_ok());
        let response = response?;

        debug!(
            "Script result: allowed={}, level={:.3}",
            response.allowed, response.level
        );

        Ok(response)
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.connection().await?;

        let response: String = self
            .timed("ping", redis::cmd("PING").query_async(&mut *conn))
            .await?;

        if response != "PONG" {
            return Err(RateLimitError::InternalError(format!(
                "Unexpected PING response: {}",
                response
            )));
        }

        let stats = self.pool_stats();
        debug!(
            "Redis healthy (pool size: {}, available: {}, max: {})",
            stats.size, stats.available, stats.max_size
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_bucket_reply() {
        let reply = vec![
            redis::Value::Int(1),
            redis::Value::BulkString(b"4.5".to_vec()),
        ];
        assert_eq!(
            parse_script_reply(&reply).unwrap(),
            ScriptResponse {
                allowed: true,
                level: 4.5
            }
        );
    }

    #[test]
    fn test_parse_fixed_window_reply() {
        let reply = vec![redis::Value::Int(0), redis::Value::Int(6)];
        assert_eq!(
            parse_script_reply(&reply).unwrap(),
            ScriptResponse {
                allowed: false,
                level: 6.0
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_reply() {
        assert!(parse_script_reply(&[redis::Value::Int(1)]).is_err());

        let reply = vec![redis::Value::Nil, redis::Value::Int(1)];
        assert!(matches!(
            parse_script_reply(&reply),
            Err(RateLimitError::ScriptExecutionError(_))
        ));
    }

    #[test]
    fn test_io_errors_are_store_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify_redis_error(RedisError::from(io));
        assert!(err.is_store_failure());
    }
}
