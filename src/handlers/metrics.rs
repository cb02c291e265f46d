use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::exposition;
use crate::AppState;

// ─── GET /metrics ────────────────────────────────────────────────
/// Encodes the registry in the OpenMetrics text format.

pub async fn scrape(State(state): State<Arc<AppState>>) -> Response {
    match exposition::encode(&state.registry) {
        Ok(payload) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], payload).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
