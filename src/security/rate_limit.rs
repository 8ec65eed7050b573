//! Tiered fixed-window rate limiting.
//!
//! Three tiers share one algorithm but not one policy:
//! - `public` may be bypassed by whitelisted addresses and fails open
//! - `auth` and `admin` are always enforced and fail closed
//!
//! The asymmetry is a security decision. Brute-force and privilege-escalation
//! surfaces must not be bypassable through spoofed or shared (NAT) addresses.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::client_key::RateLimitKey;
use super::clock::Clock;
use super::counter_store::{CounterStore, StoreError, WindowSnapshot};
use crate::config::schema::{RateLimitConfig, TierLimitConfig};
use crate::error::GuardError;
use crate::observability::metrics;

/// Named rate-limit policy bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Auth,
    Admin,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Public, Tier::Auth, Tier::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Auth => "auth",
            Tier::Admin => "admin",
        }
    }

    /// Only `public` keeps serving when the counter store is down.
    pub fn fails_open(&self) -> bool {
        matches!(self, Tier::Public)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-tier policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitTierConfig {
    #[serde(rename = "windowMs", serialize_with = "serialize_ms")]
    pub window: Duration,
    #[serde(rename = "maxRequests")]
    pub max_requests: u64,
    #[serde(rename = "bypassWhitelist")]
    pub bypass_whitelist: bool,
}

fn serialize_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl RateLimitTierConfig {
    pub fn for_tier(tier: Tier, limits: &TierLimitConfig) -> Self {
        Self {
            window: Duration::from_millis(limits.window_ms),
            max_requests: limits.max_requests,
            // Not configurable: the bypass belongs to the public tier alone.
            bypass_whitelist: tier == Tier::Public,
        }
    }
}

/// Addresses allowed to skip `public` tier enforcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: BTreeSet<RateLimitKey>,
}

impl Whitelist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .filter(|e| !e.as_ref().trim().is_empty())
            .map(|e| RateLimitKey::parse(e.as_ref()))
            .collect();
        Self { entries }
    }

    pub fn contains(&self, key: &RateLimitKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three configured tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierSet {
    pub public: RateLimitTierConfig,
    pub auth: RateLimitTierConfig,
    pub admin: RateLimitTierConfig,
}

impl TierSet {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            public: RateLimitTierConfig::for_tier(Tier::Public, &config.public),
            auth: RateLimitTierConfig::for_tier(Tier::Auth, &config.auth),
            admin: RateLimitTierConfig::for_tier(Tier::Admin, &config.admin),
        }
    }

    pub fn get(&self, tier: Tier) -> &RateLimitTierConfig {
        match tier {
            Tier::Public => &self.public,
            Tier::Auth => &self.auth,
            Tier::Admin => &self.admin,
        }
    }
}

/// Outcome of a rate-limit check that lets the request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Counted and within the limit.
    Allowed {
        limit: u64,
        remaining: u64,
        reset_after_secs: u64,
    },
    /// Whitelisted; no counter was touched.
    Bypassed,
    /// The store failed and the tier fails open.
    FailedOpen,
}

/// Tier-aware limiter over an injected [`CounterStore`].
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    tiers: TierSet,
    whitelist: Arc<Whitelist>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        tiers: TierSet,
        whitelist: Whitelist,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            tiers,
            whitelist: Arc::new(whitelist),
            clock,
            store_timeout,
        }
    }

    pub fn tiers(&self) -> &TierSet {
        &self.tiers
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Decide whether `key` may make another request on `tier`.
    ///
    /// Denials and fail-closed store outages come back as [`GuardError`].
    pub async fn check(&self, tier: Tier, key: &RateLimitKey) -> Result<RateDecision, GuardError> {
        let config = self.tiers.get(tier);

        if config.bypass_whitelist && self.whitelist.contains(key) {
            debug!(tier = %tier, client = %key, "Whitelisted client bypasses rate limit");
            return Ok(RateDecision::Bypassed);
        }

        let now = self.clock.now_ms();
        let snapshot = match self.increment(tier, key, now, config.window).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.on_store_failure(tier, key, e),
        };

        let reset_after_secs = seconds_until_reset(&snapshot, config.window, now);

        if snapshot.count > config.max_requests {
            warn!(
                tier = %tier,
                client = %key,
                limit = config.max_requests,
                retry_after = reset_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(tier.as_str());
            return Err(GuardError::RateLimitExceeded {
                tier,
                retry_after_secs: reset_after_secs,
            });
        }

        Ok(RateDecision::Allowed {
            limit: config.max_requests,
            remaining: config.max_requests - snapshot.count,
            reset_after_secs,
        })
    }

    async fn increment(
        &self,
        tier: Tier,
        key: &RateLimitKey,
        now: u64,
        window: Duration,
    ) -> Result<WindowSnapshot, StoreError> {
        match tokio::time::timeout(self.store_timeout, self.store.increment(tier, key, now, window))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }

    fn on_store_failure(
        &self,
        tier: Tier,
        key: &RateLimitKey,
        err: StoreError,
    ) -> Result<RateDecision, GuardError> {
        let policy = if tier.fails_open() { "open" } else { "closed" };
        error!(
            tier = %tier,
            client = %key,
            policy,
            error = %err,
            "Counter store unavailable"
        );
        metrics::record_store_failure(tier.as_str(), policy);

        if tier.fails_open() {
            Ok(RateDecision::FailedOpen)
        } else {
            Err(GuardError::CounterStoreUnavailable {
                tier,
                reason: err.to_string(),
            })
        }
    }
}

/// `ceil((window_started_at + window - now) / 1000)`, never below one second.
fn seconds_until_reset(snapshot: &WindowSnapshot, window: Duration, now: u64) -> u64 {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    let reset_at = snapshot.window_started_at.saturating_add(window_ms);
    let remaining_ms = reset_at.saturating_sub(now);
    remaining_ms.div_ceil(1_000).max(1)
}
