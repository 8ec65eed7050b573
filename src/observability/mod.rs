//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Guard decisions produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (rejection and failure counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON in production)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log line via the trace span
//! - Denials are logged with the reason; bodies never carry it

pub mod logging;
pub mod metrics;
