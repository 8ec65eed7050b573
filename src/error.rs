//! Error taxonomy for the request-defense layer.
//!
//! Every rejection is rendered through the same JSON envelope:
//! ```text
//! {"success": false, "error": {"code": "...", "message": "...", "retryAfter": n?}}
//! ```
//! Internal detail (counts, token values, which CSRF sub-check failed) stays
//! in the server logs and never reaches the body.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::security::csrf::CsrfFailure;
use crate::security::rate_limit::Tier;

pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
pub const CSRF_VALIDATION_FAILED: &str = "CSRF_VALIDATION_FAILED";
pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";

/// A terminal rejection produced by the guard pipeline.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Expected backpressure. Retryable after `retry_after_secs`.
    #[error("rate limit exceeded on {tier} tier, retry after {retry_after_secs}s")]
    RateLimitExceeded { tier: Tier, retry_after_secs: u64 },

    /// Forged request or stale cookie. Not retryable without a fresh token.
    #[error("CSRF validation failed: {0}")]
    CsrfValidationFailed(CsrfFailure),

    /// The counter store could not answer and the tier fails closed.
    #[error("counter store unavailable for {tier} tier: {reason}")]
    CounterStoreUnavailable { tier: Tier, reason: String },
}

impl GuardError {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GuardError::CsrfValidationFailed(_) => StatusCode::FORBIDDEN,
            GuardError::CounterStoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GuardError::RateLimitExceeded { .. } => RATE_LIMIT_EXCEEDED,
            GuardError::CsrfValidationFailed(_) => CSRF_VALIDATION_FAILED,
            GuardError::CounterStoreUnavailable { .. } => SERVICE_UNAVAILABLE,
        }
    }

    /// Client-facing message. Deliberately identical for every CSRF failure.
    fn public_message(&self) -> &'static str {
        match self {
            GuardError::RateLimitExceeded { .. } => {
                "Too many requests, please try again later."
            }
            GuardError::CsrfValidationFailed(_) => "CSRF token missing or invalid.",
            GuardError::CounterStoreUnavailable { .. } => {
                "Service temporarily unavailable, please try again later."
            }
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            GuardError::RateLimitExceeded { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Uniform error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                retry_after: None,
            },
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self.retry_after();
        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.public_message().to_string(),
                retry_after,
            },
        };

        let mut response = (status, Json(envelope)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_envelope() {
        let err = GuardError::RateLimitExceeded {
            tier: Tier::Public,
            retry_after_secs: 7,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "7");

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], RATE_LIMIT_EXCEEDED);
        assert_eq!(json["error"]["retryAfter"], 7);
    }

    #[tokio::test]
    async fn test_csrf_failures_are_indistinguishable() {
        let mut bodies = Vec::new();
        for reason in [
            CsrfFailure::MissingCookie,
            CsrfFailure::MissingHeader,
            CsrfFailure::Mismatch,
        ] {
            let response = GuardError::CsrfValidationFailed(reason).into_response();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            bodies.push(body_json(response).await);
        }
        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[1], bodies[2]);
        assert_eq!(bodies[0]["error"]["code"], CSRF_VALIDATION_FAILED);
        assert!(bodies[0]["error"].get("retryAfter").is_none());
    }

    #[tokio::test]
    async fn test_store_unavailable_hides_reason() {
        let err = GuardError::CounterStoreUnavailable {
            tier: Tier::Auth,
            reason: "connection refused to 10.0.0.5".into(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], SERVICE_UNAVAILABLE);
        assert!(!json.to_string().contains("10.0.0.5"));
    }
}
