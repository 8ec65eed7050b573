//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Environment, GuardConfig, TierLimitConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GuardConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Defaults plus environment overrides, validated.
pub fn load_from_env() -> Result<GuardConfig, ConfigError> {
    let mut config = GuardConfig::default();

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment-style overrides read through `lookup`.
///
/// Values that fail to parse are ignored and the configured value is kept.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(env) = lookup("APP_ENV") {
        if env.eq_ignore_ascii_case("production") {
            config.environment = Environment::Production;
        }
    }
    if let Some(addr) = lookup("GUARD_BIND_ADDR") {
        config.listener.bind_address = addr;
    }

    let rl = &mut config.rate_limit;
    override_tier(&lookup, "PUBLIC", &mut rl.public);
    override_tier(&lookup, "AUTH", &mut rl.auth);
    override_tier(&lookup, "ADMIN", &mut rl.admin);

    if let Some(raw) = lookup("RATE_LIMIT_WHITELIST") {
        rl.whitelist = raw
            .split(',')
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(flag) = lookup("RATE_LIMIT_TRUST_PROXY_HEADERS").and_then(|v| parse_bool(&v)) {
        rl.trust_proxy_headers = flag;
    }
    if let Some(flag) = lookup("CSRF_SECURE_COOKIE").and_then(|v| parse_bool(&v)) {
        config.csrf.secure_cookie = flag;
    }
}

fn override_tier<F>(lookup: &F, tier: &str, limits: &mut TierLimitConfig)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(max) = lookup(&format!("RATE_LIMIT_{tier}_MAX")).and_then(|v| v.trim().parse().ok()) {
        limits.max_requests = max;
    }
    if let Some(window) =
        lookup(&format!("RATE_LIMIT_{tier}_WINDOW_MS")).and_then(|v| v.trim().parse().ok())
    {
        limits.window_ms = window;
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
