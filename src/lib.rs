pub mod clock;
pub mod config;
pub mod errors;
pub mod limiter;
pub mod metrics;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, LimiterConfig, StrategyConfig};
pub use errors::{RateLimitError, Result};
pub use limiter::{Decision, LimitStatus, RateLimiter};
pub use store::{MemoryStore, RedisStore, Store};
