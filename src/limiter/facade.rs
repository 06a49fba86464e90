use crate::clock::{Clock, SystemClock};
use crate::config::validator::validate_namespace;
use crate::config::{LimiterConfig, StrategyConfig};
use crate::errors::Result;
use crate::limiter::{Decision, FixedWindow, LimitStatus, RateLimitKey, Strategy, TokenBucket};
use crate::metrics;
use crate::store::Store;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Entry point for callers: identity in, decision out.
///
/// Holds no per-identity state. Each `check` reads the clock once and makes
/// exactly one atomic store call; store failures are returned as errors and
/// never turned into a verdict.
pub struct RateLimiter {
    namespace: String,
    strategy: Box<dyn Strategy>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Build the configured strategy over `store`; invalid configuration fails here
    pub fn new<S: Store + 'static>(
        store: Arc<S>,
        config: &LimiterConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        validate_namespace(&config.namespace)?;

        let strategy: Box<dyn Strategy> = match &config.strategy {
            StrategyConfig::TokenBucket(tb) => Box::new(TokenBucket::new(store.clone(), tb)?),
            StrategyConfig::FixedWindow(fw) => Box::new(FixedWindow::new(store.clone(), fw)?),
        };

        Ok(Self {
            namespace: config.namespace.clone(),
            strategy,
            store,
            clock,
        })
    }

    /// Same as [`RateLimiter::new`] with the system wall clock
    pub fn from_config<S: Store + 'static>(store: Arc<S>, config: &LimiterConfig) -> Result<Self> {
        Self::new(store, config, Arc::new(SystemClock))
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn key_for(&self, identity: &str) -> RateLimitKey {
        RateLimitKey::derive(&self.namespace, identity)
    }

    /// Whether one request from `identity` may proceed
    pub async fn is_allowed(&self, identity: &str) -> Result<bool> {
        Ok(self.check(identity).await?.allowed)
    }

    /// Decide one request from `identity`, consuming quota when allowed
    pub async fn check(&self, identity: &str) -> Result<Decision> {
        let key = self.key_for(identity);
        let now = self.clock.now();
        let start = Instant::now();

        let decision = self.strategy.decide(&key, now).await.map_err(|e| {
            error!("Rate limit decision for {} failed: {}", key, e);
            e
        })?;

        metrics::record_decision(
            self.strategy.name(),
            decision.allowed,
            start.elapsed().as_secs_f64(),
        );
        debug!(
            "Rate limit decision: key={}, allowed={}, remaining={:.2}",
            key, decision.allowed, decision.remaining
        );

        Ok(decision)
    }

    /// Inspect `identity`'s quota without consuming it
    pub async fn status(&self, identity: &str) -> Result<LimitStatus> {
        let key = self.key_for(identity);
        self.strategy.status(&key, self.clock.now()).await
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }

    /// Bump the namespace-wide hit counter and return the new total
    pub async fn record_hit(&self) -> Result<i64> {
        self.store.incr(&format!("{}:global_hits", self.namespace)).await
    }
}
