//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Deployment environment. `production` forces `Secure` cookies.
    pub environment: Environment,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Tiered rate limiting.
    pub rate_limit: RateLimitConfig,

    /// CSRF double-submit settings.
    pub csrf: CsrfConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GuardConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Thresholds for one tier.
///
/// A tier table may set either field alone; the other keeps that tier's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TierLimitConfig {
    /// Requests allowed per window.
    pub max_requests: u64,

    /// Fixed window length in milliseconds.
    pub window_ms: u64,
}

impl TierLimitConfig {
    pub const PUBLIC: Self = Self {
        max_requests: 900,
        window_ms: 30_000,
    };

    // Brute-force surface: 5 attempts per 15 minutes.
    pub const AUTH: Self = Self {
        max_requests: 5,
        window_ms: 15 * 60 * 1_000,
    };

    pub const ADMIN: Self = Self {
        max_requests: 100,
        window_ms: 60_000,
    };
}

#[derive(Deserialize)]
struct PartialTierLimits {
    max_requests: Option<u64>,
    window_ms: Option<u64>,
}

impl PartialTierLimits {
    fn over(self, base: TierLimitConfig) -> TierLimitConfig {
        TierLimitConfig {
            max_requests: self.max_requests.unwrap_or(base.max_requests),
            window_ms: self.window_ms.unwrap_or(base.window_ms),
        }
    }
}

fn public_tier<'de, D: Deserializer<'de>>(d: D) -> Result<TierLimitConfig, D::Error> {
    PartialTierLimits::deserialize(d).map(|p| p.over(TierLimitConfig::PUBLIC))
}

fn auth_tier<'de, D: Deserializer<'de>>(d: D) -> Result<TierLimitConfig, D::Error> {
    PartialTierLimits::deserialize(d).map(|p| p.over(TierLimitConfig::AUTH))
}

fn admin_tier<'de, D: Deserializer<'de>>(d: D) -> Result<TierLimitConfig, D::Error> {
    PartialTierLimits::deserialize(d).map(|p| p.over(TierLimitConfig::ADMIN))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Client addresses exempt from the `public` tier only.
    pub whitelist: Vec<String>,

    /// Derive the client key from `X-Forwarded-For` (only behind a trusted proxy).
    pub trust_proxy_headers: bool,

    /// Upper bound on a single counter store call.
    pub store_timeout_ms: u64,

    /// How often idle windows are purged from the in-memory store.
    pub cleanup_interval_secs: u64,

    /// Emit `X-RateLimit-*` headers on allowed responses.
    pub standard_headers: bool,

    #[serde(deserialize_with = "public_tier")]
    pub public: TierLimitConfig,
    #[serde(deserialize_with = "auth_tier")]
    pub auth: TierLimitConfig,
    #[serde(deserialize_with = "admin_tier")]
    pub admin: TierLimitConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            trust_proxy_headers: false,
            store_timeout_ms: 50,
            cleanup_interval_secs: 60,
            standard_headers: true,
            public: TierLimitConfig::PUBLIC,
            auth: TierLimitConfig::AUTH,
            admin: TierLimitConfig::ADMIN,
        }
    }
}

/// CSRF configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Cookie carrying the token.
    pub cookie_name: String,

    /// Header the client echoes the token in.
    pub header_name: String,

    /// Random bytes per token (before encoding). At least 16.
    pub token_bytes: usize,

    /// Add `Secure` to the cookie outside production too.
    pub secure_cookie: bool,

    /// Paths that skip validation (pre-authentication endpoints).
    pub exempt_paths: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrfToken".to_string(),
            header_name: "X-CSRF-Token".to_string(),
            token_bytes: 32,
            secure_cookie: false,
            exempt_paths: vec![
                "/auth/login".to_string(),
                "/auth/register".to_string(),
                "/auth/logout".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Output format for log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "request_guard=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
