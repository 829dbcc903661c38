//! Axum router configuration with middleware.
//!
//! Two routes only: `GET /` for liveness probes and `GET /status` for
//! backup state. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the status router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(liveness))
        .route("/status", get(handlers::status::get_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - Plain-text liveness check for dumb probes.
async fn liveness() -> &'static str {
    "sessionkeeper is running"
}
