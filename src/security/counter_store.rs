//! Fixed-window counter storage.
//!
//! # Responsibilities
//! - Hold `(count, window_started_at)` per `(tier, key)`
//! - Atomic increment-and-reset per key
//! - Drop idle windows on demand
//!
//! # Limitations
//! [`InMemoryCounterStore`] lives in process memory. Behind a load balancer
//! with several instances every instance counts on its own, so the effective
//! limit is `max_requests * instances`. Multi-instance deployments must plug
//! in a shared [`CounterStore`] implementation instead.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::trace;

use super::client_key::RateLimitKey;
use super::rate_limit::Tier;

/// Failure talking to the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
    #[error("counter store backend error: {0}")]
    Backend(String),
}

/// Per `(tier, key)` window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindowState {
    pub count: u64,
    pub window_started_at: u64,
    pub window_ms: u64,
}

impl RateWindowState {
    fn fresh(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            window_started_at: now_ms,
            window_ms,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.window_started_at) >= self.window_ms
    }
}

/// Result of a single increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub count: u64,
    pub window_started_at: u64,
}

/// Storage backend for rate-limit counters.
///
/// Implementations must make `increment` atomic with respect to concurrent
/// calls for the same `(tier, key)`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request and return the state after the mutation.
    ///
    /// A window older than `window` is replaced by a fresh one with `count = 1`.
    async fn increment(
        &self,
        tier: Tier,
        key: &RateLimitKey,
        now_ms: u64,
        window: Duration,
    ) -> Result<WindowSnapshot, StoreError>;

    /// Drop windows that have expired at `now_ms`. Returns how many were removed.
    async fn purge_expired(&self, now_ms: u64) -> usize;

    /// Number of live windows.
    async fn tracked_keys(&self) -> usize;
}

/// Single-process store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<(Tier, RateLimitKey), RateWindowState>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state without mutating it.
    pub fn peek(&self, tier: Tier, key: &RateLimitKey) -> Option<RateWindowState> {
        self.windows.get(&(tier, key.clone())).map(|w| *w)
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(
        &self,
        tier: Tier,
        key: &RateLimitKey,
        now_ms: u64,
        window: Duration,
    ) -> Result<WindowSnapshot, StoreError> {
        let window_ms = window.as_millis() as u64;

        // The entry guard holds the shard write lock for the whole update.
        let mut entry = self
            .windows
            .entry((tier, key.clone()))
            .or_insert_with(|| RateWindowState {
                count: 0,
                window_started_at: now_ms,
                window_ms,
            });
        let state = entry.value_mut();

        if state.count > 0 && state.is_expired(now_ms) {
            trace!(tier = %tier, key = %key, "Window expired, starting a new one");
            *state = RateWindowState::fresh(now_ms, window_ms);
        } else {
            state.count += 1;
            state.window_ms = window_ms;
        }

        Ok(WindowSnapshot {
            count: state.count,
            window_started_at: state.window_started_at,
        })
    }

    async fn purge_expired(&self, now_ms: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, state| !state.is_expired(now_ms));
        before.saturating_sub(self.windows.len())
    }

    async fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
