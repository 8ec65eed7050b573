//! End-to-end rate limiting over a real socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use request_guard::config::{GuardConfig, TierLimitConfig};
use request_guard::security::counter_store::{StoreError, WindowSnapshot};
use request_guard::security::{CounterStore, RateLimitKey, Tier};

mod common;

fn limits(max_requests: u64, window_ms: u64) -> TierLimitConfig {
    TierLimitConfig {
        max_requests,
        window_ms,
    }
}

#[tokio::test]
async fn test_public_tier_blocks_then_recovers() {
    let mut config = GuardConfig::default();
    config.rate_limit.public = limits(5, 1000);
    let guard = common::spawn_guard(config).await;
    let client = reqwest::Client::new();

    for i in 0..5 {
        let res = client.get(guard.url("/public/ping")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "request {} should pass", i + 1);
        assert_eq!(res.headers()["x-ratelimit-limit"], "5");
        assert_eq!(
            res.headers()["x-ratelimit-remaining"].to_str().unwrap(),
            (4 - i).to_string()
        );
    }

    let res = client.get(guard.url("/public/ping")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["retry-after"], "1");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["error"]["retryAfter"], 1);
    assert!(body["error"]["message"].is_string());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let res = client.get(guard.url("/public/ping")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "4");
}

#[tokio::test]
async fn test_tiers_are_counted_separately() {
    let mut config = GuardConfig::default();
    config.rate_limit.public = limits(1, 60_000);
    config.rate_limit.admin = limits(1, 60_000);
    let guard = common::spawn_guard(config).await;
    let client = reqwest::Client::new();

    let res = client.get(guard.url("/public/ping")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client.get(guard.url("/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(guard.url("/public/ping")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let res = client.get(guard.url("/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_whitelist_only_bypasses_public_tier() {
    let mut config = GuardConfig::default();
    config.rate_limit.whitelist = vec!["127.0.0.1".into()];
    config.rate_limit.public = limits(1, 60_000);
    config.rate_limit.auth = limits(1, 60_000);
    let guard = common::spawn_guard(config).await;
    let client = reqwest::Client::new();

    for _ in 0..5 {
        let res = client.get(guard.url("/public/ping")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("x-ratelimit-limit").is_none());
    }

    let res = client
        .post(guard.url("/auth/login"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(guard.url("/auth/login"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rotating_forwarded_prefix_does_not_reset_auth_bucket() {
    let mut config = GuardConfig::default();
    config.rate_limit.trust_proxy_headers = true;
    config.rate_limit.auth = limits(1, 60_000);
    let guard = common::spawn_guard(config).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for i in 1..=5 {
        let res = client
            .post(guard.url("/auth/login"))
            .header("x-forwarded-for", format!("10.0.0.{}, 9.9.9.9", i))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        statuses.push(res.status());
    }

    assert_eq!(statuses[0], StatusCode::UNAUTHORIZED);
    assert!(statuses[1..]
        .iter()
        .all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_forwarded_prefix_cannot_claim_whitelisted_address() {
    let mut config = GuardConfig::default();
    config.rate_limit.trust_proxy_headers = true;
    config.rate_limit.whitelist = vec!["127.0.0.1".into()];
    config.rate_limit.public = limits(1, 60_000);
    let guard = common::spawn_guard(config).await;
    let client = reqwest::Client::new();

    let send = || {
        client
            .get(guard.url("/public/ping"))
            .header("x-forwarded-for", "127.0.0.1, 9.9.9.9")
            .send()
    };
    assert_eq!(send().await.unwrap().status(), StatusCode::OK);
    assert_eq!(send().await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_unclassified_paths_are_not_limited() {
    let mut config = GuardConfig::default();
    config.rate_limit.public = limits(1, 60_000);
    let guard = common::spawn_guard(config).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let res = client.get(guard.url("/health")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_standard_headers_can_be_disabled() {
    let mut config = GuardConfig::default();
    config.rate_limit.standard_headers = false;
    let guard = common::spawn_guard(config).await;

    let res = reqwest::get(guard.url("/public/ping")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-ratelimit-remaining").is_none());
}

struct UnavailableStore;

#[async_trait]
impl CounterStore for UnavailableStore {
    async fn increment(
        &self,
        _tier: Tier,
        _key: &RateLimitKey,
        _now_ms: u64,
        _window: Duration,
    ) -> Result<WindowSnapshot, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn purge_expired(&self, _now_ms: u64) -> usize {
        0
    }

    async fn tracked_keys(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn test_store_outage_fails_open_for_public_and_closed_for_auth() {
    let guard =
        common::spawn_guard_with_store(GuardConfig::default(), Arc::new(UnavailableStore)).await;
    let client = reqwest::Client::new();

    let res = client.get(guard.url("/public/ping")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(guard.url("/auth/login"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert!(!body.to_string().contains("connection refused"));

    let res = client.get(guard.url("/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}
