use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::pipeline::GuardState;
use crate::security::rate_limit::TierSet;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_windows: usize,
    pub whitelist_size: usize,
    pub secure_cookies: bool,
    pub tiers: TierSet,
}

/// Read-only limiter overview. Never exposes per-client counts or tokens.
pub async fn get_status(State(state): State<GuardState>) -> Json<GuardStatus> {
    let tracked_windows = state.limiter.store().tracked_keys().await;

    Json(GuardStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_windows,
        whitelist_size: state.limiter.whitelist().len(),
        secure_cookies: state.csrf.is_secure(),
        tiers: *state.limiter.tiers(),
    })
}
