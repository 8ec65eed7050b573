//! Demonstration handlers behind the guard.
//!
//! Authentication itself is out of scope: login always answers 401 so the
//! auth tier and the CSRF exemption can be exercised end to end.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::error::ErrorEnvelope;
use crate::http::pipeline::GuardState;
use crate::security::CsrfToken;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "success": true, "message": "pong" }))
}

/// Echo the token bound to this request so non-browser clients can read it.
pub async fn csrf_token(Extension(CsrfToken(token)): Extension<CsrfToken>) -> Json<Value> {
    Json(json!({ "success": true, "csrfToken": token }))
}

pub async fn echo(Json(payload): Json<Value>) -> Json<Value> {
    Json(json!({ "success": true, "data": payload }))
}

pub async fn login() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorEnvelope::new(
            "AUTHENTICATION_FAILED",
            "Invalid credentials.",
        )),
    )
        .into_response()
}

pub async fn register() -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "success": true }))).into_response()
}

/// Ends the session and explicitly clears the CSRF token.
pub async fn logout(State(state): State<GuardState>) -> Response {
    (
        [(header::SET_COOKIE, state.csrf.clear_cookie())],
        Json(json!({ "success": true })),
    )
        .into_response()
}
