//! HTTP surface of the guard.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace, timeout)
//!     → pipeline.rs (rate limit → CSRF)
//!     → handlers.rs / admin routes
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Guard middlewares are plain `from_fn_with_state` functions so any
//!   router can be wrapped with [`protect`]
//! - Rejections are rendered by `GuardError`, never by the middleware itself

pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod server;

pub use pipeline::{protect, GuardState};
pub use request::X_REQUEST_ID;
pub use server::{build_router, HttpServer};
