use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid rate configuration: {0}")]
    InvalidRate(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store command timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Store command error: {0}")]
    StoreCommandError(String),

    #[error("Script execution error: {0}")]
    ScriptExecutionError(String),

    #[error("File system error: {0}")]
    FileSystemError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RateLimitError {
    /// True when the shared store could not be reached in time. This is never
    /// a rate-limit verdict; callers pick their own fail-open or fail-closed policy.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            RateLimitError::StoreUnavailable(_) | RateLimitError::StoreTimeout(_)
        )
    }

    /// HTTP status code used by the serving surface.
    pub fn http_status(&self) -> u16 {
        match self {
            RateLimitError::StoreUnavailable(_) | RateLimitError::StoreTimeout(_) => 503,
            RateLimitError::ConfigurationError(_) | RateLimitError::InvalidRate(_) => 400,
            _ => 500,
        }
    }

    /// Short label for the store error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            RateLimitError::ConfigurationError(_) => "configuration",
            RateLimitError::InvalidRate(_) => "invalid_rate",
            RateLimitError::StoreUnavailable(_) => "unavailable",
            RateLimitError::StoreTimeout(_) => "timeout",
            RateLimitError::RedisError(_) => "redis",
            RateLimitError::StoreCommandError(_) => "command",
            RateLimitError::ScriptExecutionError(_) => "script",
            RateLimitError::FileSystemError(_) => "filesystem",
            RateLimitError::JsonError(_) => "json",
            RateLimitError::InternalError(_) => "internal",
        }
    }
}

/// Result type alias for rate limiter operations
pub type Result<T> = std::result::Result<T, RateLimitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failures_map_to_unavailable() {
        let down = RateLimitError::StoreUnavailable("connection refused".to_string());
        let slow = RateLimitError::StoreTimeout(Duration::from_secs(2));

        assert!(down.is_store_failure());
        assert!(slow.is_store_failure());
        assert_eq!(down.http_status(), 503);
        assert_eq!(slow.http_status(), 503);
    }

    #[test]
    fn test_other_errors_are_not_store_failures() {
        let err = RateLimitError::ScriptExecutionError("bad reply".to_string());
        assert!(!err.is_store_failure());
        assert_eq!(err.http_status(), 500);

        let err = RateLimitError::InvalidRate("rate must not be negative".to_string());
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.kind(), "invalid_rate");
    }
}
