//! Tiered rate limiting middleware.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::pipeline::GuardState;
use crate::http::request::request_id;
use crate::security::rate_limit::RateDecision;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Throttle the request by its route tier before anything else runs.
pub async fn rate_limit_middleware(
    State(state): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let class = state.routes.classify(request.uri().path());
    let Some(tier) = class.tier else {
        return next.run(request).await;
    };

    let key = state.keys.extract(&request);
    tracing::trace!(
        request_id = %request_id(&request),
        route = class.name,
        tier = %tier,
        client = %key,
        "Checking rate limit"
    );

    match state.limiter.check(tier, &key).await {
        Ok(decision) => {
            let mut response = next.run(request).await;
            if state.standard_headers {
                if let RateDecision::Allowed {
                    limit,
                    remaining,
                    reset_after_secs,
                } = decision
                {
                    let headers = response.headers_mut();
                    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
                    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
                    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_after_secs));
                }
            }
            response
        }
        Err(rejection) => rejection.into_response(),
    }
}
