pub mod handlers;

use axum::{routing::get, Router};

use crate::http::pipeline::GuardState;
use self::handlers::*;

/// Admin routes. Mounted under `/admin`, so they sit on the admin tier.
pub fn admin_routes() -> Router<GuardState> {
    Router::new().route("/admin/status", get(get_status))
}
