use crate::config::{
    AppConfig, FixedWindowConfig, LimiterConfig, RedisConfig, StrategyConfig, TokenBucketConfig,
};
use crate::errors::{RateLimitError, Result};
use tracing::{debug, warn};

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    debug!("Validating configuration...");

    validate_redis_config(&config.redis)?;
    validate_limiter_config(&config.limiter)?;

    debug!("Configuration validation successful");
    Ok(())
}

/// Validate Redis configuration
pub fn validate_redis_config(config: &RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(RateLimitError::ConfigurationError(
            "Redis URL cannot be empty".to_string(),
        ));
    }

    if !config.url.starts_with("redis://") && !config.url.starts_with("rediss://") {
        return Err(RateLimitError::ConfigurationError(format!(
            "Invalid Redis URL format. Must start with redis:// or rediss:// (got {})",
            crate::config::loader::mask_password(&config.url)
        )));
    }

    if config.max_connections == 0 {
        return Err(RateLimitError::ConfigurationError(
            "max_connections must be greater than 0".to_string(),
        ));
    }

    if config.max_connections > 1000 {
        warn!(
            "max_connections is very high ({}). This may consume excessive resources.",
            config.max_connections
        );
    }

    if config.connection_timeout_secs == 0 {
        return Err(RateLimitError::ConfigurationError(
            "connection_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.command_timeout_secs == 0 {
        return Err(RateLimitError::ConfigurationError(
            "command_timeout_secs must be greater than 0".to_string(),
        ));
    }

    debug!("Redis configuration valid");
    Ok(())
}

/// Validate namespace and the active strategy
pub fn validate_limiter_config(config: &LimiterConfig) -> Result<()> {
    validate_namespace(&config.namespace)?;

    match &config.strategy {
        StrategyConfig::TokenBucket(tb) => validate_token_bucket(tb),
        StrategyConfig::FixedWindow(fw) => validate_fixed_window(fw),
    }
}

/// Namespaces may not contain braces: the identity is wrapped in a
/// `{...}` hash tag and the namespace must not open one first.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(RateLimitError::ConfigurationError(
            "Namespace cannot be empty".to_string(),
        ));
    }

    if namespace.contains('{') || namespace.contains('}') {
        return Err(RateLimitError::ConfigurationError(format!(
            "Namespace '{}' must not contain '{{' or '}}'",
            namespace
        )));
    }

    Ok(())
}

/// Validate token bucket parameters
pub fn validate_token_bucket(config: &TokenBucketConfig) -> Result<()> {
    if !config.rate.is_finite() || config.rate < 0.0 {
        return Err(RateLimitError::InvalidRate(format!(
            "rate must be a finite, non-negative number of tokens per second (got {})",
            config.rate
        )));
    }

    if !config.capacity.is_finite() || config.capacity < 0.0 {
        return Err(RateLimitError::InvalidRate(format!(
            "capacity must be a finite, non-negative number (got {})",
            config.capacity
        )));
    }

    if config.idle_ttl_secs == 0 {
        return Err(RateLimitError::InvalidRate(
            "idle_ttl_secs must be greater than 0".to_string(),
        ));
    }

    if config.capacity < 1.0 {
        warn!(
            "Token bucket capacity {} is below 1: every request will be denied",
            config.capacity
        );
    }

    if config.rate == 0.0 {
        warn!("Token bucket rate is 0: buckets never refill once drained");
    } else {
        let seconds_to_fill = config.capacity / config.rate;
        if seconds_to_fill > config.idle_ttl_secs as f64 {
            debug!(
                "Bucket takes {:.2}s to refill but idles out after {}s; idle keys restart full",
                seconds_to_fill, config.idle_ttl_secs
            );
        }
    }

    Ok(())
}

/// Validate fixed window parameters
pub fn validate_fixed_window(config: &FixedWindowConfig) -> Result<()> {
    if config.window_secs == 0 {
        return Err(RateLimitError::InvalidRate(
            "window_secs must be greater than 0".to_string(),
        ));
    }

    if config.limit == 0 {
        warn!("Fixed window limit is 0: every request will be denied");
    }

    Ok(())
}
