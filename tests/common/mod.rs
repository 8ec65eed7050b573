//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use request_guard::config::GuardConfig;
use request_guard::http::HttpServer;
use request_guard::lifecycle::Shutdown;
use request_guard::security::{Clock, CounterStore, SystemClock};
use tokio::net::TcpListener;

/// A running guard bound to an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a guard with the in-memory store.
pub async fn spawn_guard(config: GuardConfig) -> TestServer {
    spawn_server(HttpServer::new(config)).await
}

/// Start a guard with an injected counter store.
#[allow(dead_code)]
pub async fn spawn_guard_with_store(config: GuardConfig, store: Arc<dyn CounterStore>) -> TestServer {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    spawn_server(HttpServer::with_backends(config, store, clock)).await
}

async fn spawn_server(server: HttpServer) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestServer { addr, shutdown }
}

/// The `name=value` part of the first `Set-Cookie` header for `name`.
#[allow(dead_code)]
pub fn cookie_pair(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Full `Set-Cookie` header for `name`.
#[allow(dead_code)]
pub fn set_cookie_header(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .map(str::to_string)
}
