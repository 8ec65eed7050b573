//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_key.rs (derive normalized client key)
//!     → rate_limit.rs (tier policy, whitelist, decision)
//!         → counter_store.rs (atomic fixed-window increment)
//!     → csrf.rs (issue token, double-submit validation)
//!     → Pass to application handler
//! ```
//!
//! # Design Decisions
//! - Throttle before validating CSRF so rejected clients cost as little as possible
//! - Fail closed on security-sensitive tiers, open on `public`
//! - No trust in client input

pub mod client_key;
pub mod clock;
pub mod counter_store;
pub mod csrf;
pub mod rate_limit;

pub use client_key::{KeyExtractor, RateLimitKey};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter_store::{CounterStore, InMemoryCounterStore, StoreError};
pub use csrf::{CsrfGuard, CsrfToken};
pub use rate_limit::{RateDecision, RateLimiter, Tier, TierSet, Whitelist};
