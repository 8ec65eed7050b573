//! Guard middleware, one per check.

pub mod csrf;
pub mod rate_limit;

pub use csrf::csrf_middleware;
pub use rate_limit::rate_limit_middleware;
