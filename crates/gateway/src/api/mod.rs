pub mod discovery;
pub mod health;
pub mod sessions;
pub mod tools;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health (used by probes)
        .route("/health", get(health::health))
        // Tool invocation (the front door)
        .route("/v1/tools/invoke", post(tools::invoke_tool))
        // Session management
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/:id", get(sessions::get_session))
        .route("/v1/sessions/:id", delete(sessions::delete_session))
        // Passive discovery ingest
        .route("/v1/discovery/ingest", post(discovery::ingest))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
