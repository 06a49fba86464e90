use crate::config::loader::mask_password;
use crate::config::RedisConfig;
use crate::errors::{RateLimitError, Result};
use deadpool::managed::PoolConfig as DeadpoolPoolConfig;
use deadpool_redis::{Config as DeadpoolRedisConfig, Pool, Runtime};
use std::time::Duration;
use tracing::{debug, info};

/// Create a Redis connection pool from configuration
pub async fn create_redis_pool(config: &RedisConfig) -> Result<Pool> {
    info!(
        "Creating Redis connection pool for {}...",
        mask_password(&config.url)
    );

    let mut cfg = DeadpoolRedisConfig::from_url(config.url.clone());

    // Waiting for or opening a connection counts against the connect timeout
    let connect_timeout = Duration::from_secs(config.connection_timeout_secs);
    let mut pool_config = DeadpoolPoolConfig::new(config.max_connections);
    pool_config.timeouts.wait = Some(connect_timeout);
    pool_config.timeouts.create = Some(connect_timeout);
    pool_config.timeouts.recycle = Some(connect_timeout);
    cfg.pool = Some(pool_config);

    let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
        RateLimitError::ConfigurationError(format!("Pool creation failed: {}", e))
    })?;

    info!(
        "Redis connection pool created (max_connections: {})",
        config.max_connections
    );

    debug!("Testing Redis connection...");
    let mut conn = pool.get().await.map_err(|e| {
        RateLimitError::StoreUnavailable(format!("Failed to get connection: {}", e))
    })?;

    let _pong: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| RateLimitError::StoreUnavailable(format!("PING failed: {}", e)))?;

    info!("Redis connection test successful");

    Ok(pool)
}

/// Get pool statistics
pub fn get_pool_stats(pool: &Pool) -> PoolStats {
    let status = pool.status();
    PoolStats {
        size: status.size,
        available: status.available,
        max_size: status.max_size,
    }
}

#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: usize,
    pub available: usize,
    pub max_size: usize,
}
