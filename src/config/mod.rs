pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};

/// Complete application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Redis configuration (loaded from environment variables only)
    pub redis: RedisConfig,

    /// Limiter configuration (loaded from file, fixed for the process lifetime)
    pub limiter: LimiterConfig,

    /// HTTP listener configuration
    pub server: ServerConfig,
}

/// Redis connection configuration (loaded from environment variables)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., "redis://localhost:6379")
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: usize,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Command timeout in seconds
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Load Redis configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("REDIS_URL").unwrap_or(defaults.url),

            max_connections: std::env::var("REDIS_MAX_CONN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),

            connection_timeout_secs: std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.connection_timeout_secs),

            command_timeout_secs: std::env::var("REDIS_COMMAND_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.command_timeout_secs),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            max_connections: 50,
            connection_timeout_secs: 5,
            command_timeout_secs: 2,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Limiter configuration (loaded from JSON file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Prefix for every key this limiter writes
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// The single active strategy for this instance
    pub strategy: StrategyConfig,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            strategy: StrategyConfig::TokenBucket(TokenBucketConfig {
                rate: 1.0,
                capacity: 10.0,
                idle_ttl_secs: default_idle_ttl_secs(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    TokenBucket(TokenBucketConfig),
    FixedWindow(FixedWindowConfig),
}

/// Continuous-refill bucket parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Tokens added per second
    pub rate: f64,

    /// Maximum burst size
    pub capacity: f64,

    /// Seconds of inactivity before both bucket keys vanish from the store
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

/// Fixed window counter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedWindowConfig {
    /// Maximum requests per window
    pub limit: u64,

    /// Window length in seconds, measured from the first request of the window
    pub window_secs: u64,
}

fn default_namespace() -> String {
    "rate_limit".to_string()
}

fn default_idle_ttl_secs() -> u64 {
    60
}
