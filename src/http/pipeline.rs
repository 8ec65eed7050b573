//! Request pipeline composition.
//!
//! ```text
//! request → rate limit (tier by route prefix) → CSRF (if route requires) → handler
//! ```
//!
//! Throttling runs first so a flood of forged requests is cut off before any
//! token work happens. Either check short-circuits with the JSON envelope.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};

use crate::config::GuardConfig;
use crate::http::middleware::{csrf_middleware, rate_limit_middleware};
use crate::routing::RouteTable;
use crate::security::{
    Clock, CounterStore, CsrfGuard, KeyExtractor, RateLimiter, TierSet, Whitelist,
};

/// Shared, read-only state for both guard middlewares.
#[derive(Clone)]
pub struct GuardState {
    pub limiter: Arc<RateLimiter>,
    pub csrf: Arc<CsrfGuard>,
    pub routes: Arc<RouteTable>,
    pub keys: KeyExtractor,
    pub standard_headers: bool,
}

impl GuardState {
    /// Build the guard from validated config and an injected store and clock.
    pub fn from_config(
        config: &GuardConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rl = &config.rate_limit;
        let limiter = RateLimiter::new(
            store,
            TierSet::from_config(rl),
            Whitelist::new(&rl.whitelist),
            clock,
            Duration::from_millis(rl.store_timeout_ms),
        );

        Self {
            limiter: Arc::new(limiter),
            csrf: Arc::new(CsrfGuard::from_config(&config.csrf, config.is_production())),
            routes: Arc::new(RouteTable::standard()),
            keys: KeyExtractor::new(rl.trust_proxy_headers),
            standard_headers: rl.standard_headers,
        }
    }
}

/// Wrap `router` with the guard pipeline.
///
/// The last layer added runs first, hence CSRF is added before rate limiting.
pub fn protect<S>(router: Router<S>, state: GuardState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(middleware::from_fn_with_state(state.clone(), csrf_middleware))
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}
