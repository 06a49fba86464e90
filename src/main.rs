use clusterlimit::config::loader::load_config;
use clusterlimit::server::start_server;
use clusterlimit::store::pool::create_redis_pool;
use clusterlimit::{RateLimiter, RedisStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clusterlimit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Rate Limiter Service Starting...");

    let config = load_config().await?;

    let pool = create_redis_pool(&config.redis).await?;
    let store = Arc::new(RedisStore::new(pool, &config.redis).await?);
    let limiter = Arc::new(RateLimiter::from_config(store, &config.limiter)?);

    tracing::info!("Using {} strategy", limiter.strategy_name());

    start_server(config.server, limiter).await?;

    Ok(())
}
