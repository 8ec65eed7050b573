//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows within (0, one day], maxima > 0, token entropy)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GuardConfig, TierLimitConfig};

/// Minimum CSRF token entropy in bytes (128 bits).
pub const MIN_TOKEN_BYTES: usize = 16;

/// Longest accepted rate-limit window: one day.
pub const MAX_WINDOW_MS: u64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),
    #[error("rate_limit.{tier}.window_ms must be greater than zero")]
    ZeroWindow { tier: &'static str },
    #[error("rate_limit.{tier}.window_ms must be at most 86400000 (one day), got {window_ms}")]
    WindowTooLong { tier: &'static str, window_ms: u64 },
    #[error("rate_limit.{tier}.max_requests must be greater than zero")]
    ZeroMaxRequests { tier: &'static str },
    #[error("rate_limit.store_timeout_ms must be greater than zero")]
    ZeroStoreTimeout,
    #[error("rate_limit.cleanup_interval_secs must be greater than zero")]
    ZeroCleanupInterval,
    #[error("csrf.token_bytes must be at least 16, got {0}")]
    WeakCsrfToken(usize),
    #[error("csrf.{field} must be a non-empty token name")]
    InvalidCsrfName { field: &'static str },
    #[error("csrf.exempt_paths entry '{0}' must start with '/'")]
    InvalidExemptPath(String),
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let rl = &config.rate_limit;
    for (tier, limits) in [("public", &rl.public), ("auth", &rl.auth), ("admin", &rl.admin)] {
        validate_tier(tier, limits, &mut errors);
    }
    if rl.store_timeout_ms == 0 {
        errors.push(ValidationError::ZeroStoreTimeout);
    }
    if rl.cleanup_interval_secs == 0 {
        errors.push(ValidationError::ZeroCleanupInterval);
    }

    let csrf = &config.csrf;
    if csrf.token_bytes < MIN_TOKEN_BYTES {
        errors.push(ValidationError::WeakCsrfToken(csrf.token_bytes));
    }
    if !is_token_name(&csrf.cookie_name) {
        errors.push(ValidationError::InvalidCsrfName {
            field: "cookie_name",
        });
    }
    if !is_token_name(&csrf.header_name) {
        errors.push(ValidationError::InvalidCsrfName {
            field: "header_name",
        });
    }
    for path in &csrf.exempt_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidExemptPath(path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tier(tier: &'static str, limits: &TierLimitConfig, errors: &mut Vec<ValidationError>) {
    if limits.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow { tier });
    } else if limits.window_ms > MAX_WINDOW_MS {
        errors.push(ValidationError::WindowTooLong {
            tier,
            window_ms: limits.window_ms,
        });
    }
    if limits.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests { tier });
    }
}

// RFC 7230 token characters, which covers both cookie and header names.
fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}
