//! CSRF middleware.
//!
//! Issues a token to clients that have none and enforces the double-submit
//! check on mutating requests to protected routes. Safe methods and exempt
//! paths pass through untouched.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::error::GuardError;
use crate::http::pipeline::GuardState;
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::security::csrf::CsrfToken;

pub async fn csrf_middleware(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let guard = &state.csrf;
    let existing = guard.cookie_token(request.headers());

    let (token, issued) = match existing.as_deref() {
        Some(token) => (token.to_string(), false),
        None => {
            debug!(request_id = %request_id(&request), "Issuing CSRF token");
            metrics::record_token_issued();
            (guard.generate_token(), true)
        }
    };

    let class = state.routes.classify(request.uri().path());
    if class.csrf {
        let verdict = guard.verify(
            request.method(),
            request.uri().path(),
            request.headers(),
            existing.as_deref(),
        );

        if let Err(reason) = verdict {
            warn!(
                request_id = %request_id(&request),
                method = %request.method(),
                path = %request.uri().path(),
                route = class.name,
                reason = %reason,
                "CSRF validation failed"
            );
            metrics::record_csrf_rejection(reason.as_str());

            let mut response = GuardError::CsrfValidationFailed(reason).into_response();
            if issued {
                response
                    .headers_mut()
                    .append(header::SET_COOKIE, guard.set_cookie(&token));
            }
            return response;
        }
    }

    request.extensions_mut().insert(CsrfToken(token.clone()));
    let mut response = next.run(request).await;

    // A handler that set or cleared the cookie itself (logout) has the last word.
    if issued && !guard.response_sets_cookie(response.headers()) {
        response
            .headers_mut()
            .append(header::SET_COOKIE, guard.set_cookie(&token));
    }
    response
}
