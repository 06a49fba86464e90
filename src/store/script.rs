use crate::errors::{RateLimitError, Result};
use redis::aio::ConnectionLike;
use redis::Script;
use tracing::{debug, info};

const TOKEN_BUCKET_LUA: &str = include_str!("../../scripts/token_bucket.lua");
const FIXED_WINDOW_LUA: &str = include_str!("../../scripts/fixed_window.lua");

/// The Lua scripts backing each atomic operation
pub struct LimiterScripts {
    pub token_bucket: Script,
    pub fixed_window: Script,
}

impl LimiterScripts {
    pub fn new() -> Self {
        Self {
            token_bucket: Script::new(TOKEN_BUCKET_LUA),
            fixed_window: Script::new(FIXED_WINDOW_LUA),
        }
    }

    /// Register both scripts with Redis so the first EVALSHA does not miss.
    ///
    /// Invocation still falls back to a reload on NOSCRIPT, so a Redis restart
    /// or failover only costs one extra round trip.
    pub async fn load<C: ConnectionLike>(&self, conn: &mut C) -> Result<()> {
        debug!("Loading Lua scripts into Redis...");

        for (name, script) in [
            ("token_bucket", &self.token_bucket),
            ("fixed_window", &self.fixed_window),
        ] {
            let sha = script
                .prepare_invoke()
                .load_async(conn)
                .await
                .map_err(|e| {
                    RateLimitError::ScriptExecutionError(format!(
                        "Failed to load {} script: {}",
                        name, e
                    ))
                })?;
            info!("Lua script '{}' loaded (SHA: {})", name, sha);
        }

        Ok(())
    }
}

impl Default for LimiterScripts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_have_distinct_hashes() {
        let scripts = LimiterScripts::new();
        assert_ne!(scripts.token_bucket.get_hash(), scripts.fixed_window.get_hash());
    }

    #[test]
    fn test_token_bucket_script_refreshes_idle_expiry_on_both_keys() {
        assert!(TOKEN_BUCKET_LUA.contains(r#"redis.call("EXPIRE", tokens_key, idle_ttl)"#));
        assert!(TOKEN_BUCKET_LUA.contains(r#"redis.call("EXPIRE", ts_key, idle_ttl)"#));
    }
}
