use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::config::Credentials;
use crate::handlers;
use crate::middleware::{auth, timing};
use crate::AppState;

/// Upper bound on producing a response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the `Router` serving the scrape endpoint and the JSON view.
/// With credentials, every route sits behind Basic auth.
pub fn create_router(state: Arc<AppState>, credentials: Option<Credentials>) -> Router {
    let router = Router::new()
        // ── Scrape endpoint ─────────────────────────────────────
        .route("/metrics", get(handlers::metrics::scrape))
        // ── Debug views ─────────────────────────────────────────
        .route("/api/snapshot", get(handlers::snapshot::get_snapshot))
        .with_state(state);

    let router = match credentials {
        Some(credentials) => router.layer(axum_mw::from_fn_with_state(
            Arc::new(credentials),
            auth::basic_auth,
        )),
        None => router,
    };

    // ── Global middleware (applied bottom-up) ───────────────────
    router
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(axum_mw::from_fn(timing::timing_middleware))
}
