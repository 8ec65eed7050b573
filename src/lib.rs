//! Request guard: tiered rate limiting and double-submit CSRF protection
//! for Axum services.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GuardConfig;
pub use error::GuardError;
pub use http::{protect, GuardState, HttpServer};
pub use lifecycle::Shutdown;
