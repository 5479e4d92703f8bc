//! Health endpoint — a read-only snapshot of the session subsystem.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};

use crate::state::AppState;

/// `GET /health`. Always 200; an unreachable backend is reported in the
/// body (`backend_reachable: false`), not as an HTTP failure, so probes
/// can distinguish "gateway down" from "backend down".
pub async fn health(State(state): State<AppState>) -> Response {
    Json(state.health.snapshot().await).into_response()
}
