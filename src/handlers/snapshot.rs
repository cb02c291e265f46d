use std::sync::Arc;

use axum::{extract::State, Json};

use crate::measurement::Snapshot;
use crate::AppState;

// ─── GET /api/snapshot ───────────────────────────────────────────
/// Returns a single JSON snapshot, useful for curl / debugging. Unlike the
/// text format this includes native histogram buckets.

pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.measurement.snapshot())
}
