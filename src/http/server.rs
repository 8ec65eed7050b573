//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the demonstration handlers
//! - Wire up the guard pipeline and cross-cutting layers (request id, trace, timeout)
//! - Run the idle-window cleanup task
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::admin_routes;
use crate::config::GuardConfig;
use crate::http::handlers;
use crate::http::pipeline::{protect, GuardState};
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::security::{Clock, CounterStore, InMemoryCounterStore, SystemClock};

/// HTTP server hosting the guarded API.
pub struct HttpServer {
    router: Router,
    config: GuardConfig,
    state: GuardState,
}

impl HttpServer {
    /// Create a server with the in-memory counter store and wall clock.
    pub fn new(config: GuardConfig) -> Self {
        Self::with_backends(config, Arc::new(InMemoryCounterStore::new()), Arc::new(SystemClock))
    }

    /// Create a server with an injected counter store and clock.
    pub fn with_backends(
        config: GuardConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = GuardState::from_config(&config, store, clock);
        let router = build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            public_max = self.config.rate_limit.public.max_requests,
            auth_max = self.config.rate_limit.auth.max_requests,
            admin_max = self.config.rate_limit.admin.max_requests,
            "HTTP server starting"
        );

        spawn_cleanup_task(
            &self.state,
            Duration::from_secs(self.config.rate_limit.cleanup_interval_secs),
            shutdown.resubscribe(),
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }
}

/// Build the Axum router with the guard pipeline and middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GuardConfig, state: GuardState) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/public/ping", get(handlers::ping))
        .route("/public/csrf-token", get(handlers::csrf_token))
        .route("/public/echo", post(handlers::echo))
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/logout", post(handlers::logout))
        .merge(admin_routes())
        .with_state(state.clone());

    protect(app, state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request),
                )
            }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static(X_REQUEST_ID),
            MakeRequestUuidV4,
        ))
}

/// Periodically drop idle windows until shutdown.
fn spawn_cleanup_task(state: &GuardState, every: Duration, mut shutdown: broadcast::Receiver<()>) {
    let store = state.limiter.store().clone();
    let clock = state.limiter.clock().clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = store.purge_expired(clock.now_ms()).await;
                    if removed > 0 {
                        tracing::debug!(removed, "Purged idle rate-limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cleanup task stopping");
                    break;
                }
            }
        }
    });
}
