//! Session management API endpoints.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::api::{api_error, tools::request_metadata};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct SessionSummary {
    session_id: String,
    client_id: String,
    user_type: String,
    created_at: chrono::DateTime<chrono::Utc>,
    last_accessed: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct SessionListResponse {
    sessions: Vec<SessionSummary>,
}

/// List the caller's active sessions. The caller is whoever the request
/// metadata resolves to — there is no cross-tenant listing here; global
/// counts live on the health surface instead.
pub async fn list_sessions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = state.identity.resolve(&request_metadata(&headers));
    let sessions = match state.directory.active_sessions(&identity).await {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::error!(error = %e, "session listing failed");
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "session store unavailable");
        }
    };
    Json(SessionListResponse {
        sessions: sessions
            .into_iter()
            .map(|s| SessionSummary {
                session_id: s.session_id,
                client_id: s.client_id,
                user_type: s.user_type.as_str().to_owned(),
                created_at: s.created_at,
                last_accessed: s.last_accessed,
            })
            .collect(),
    })
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/sessions/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fetch one of the caller's sessions. Foreign sessions are 404, the
/// same as absent ones, so callers cannot probe which ids exist.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let identity = state.identity.resolve(&request_metadata(&headers));
    match state.store.get(&session_id).await {
        Ok(Some(session)) if session.identity_hash == identity.hash() => {
            Json(session).into_response()
        }
        Ok(_) => api_error(StatusCode::NOT_FOUND, "session not found"),
        Err(e) => {
            tracing::error!(session_id, error = %e, "session lookup failed");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "session store unavailable")
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/sessions/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deactivate one of the caller's sessions. Ownership is checked against
/// the caller's resolved identity; a foreign or absent session is 404 so
/// callers cannot probe which ids exist.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let identity = state.identity.resolve(&request_metadata(&headers));
    match state.directory.deactivate(&session_id, &identity).await {
        Ok(true) => Json(serde_json::json!({ "deactivated": true })).into_response(),
        Ok(false) => api_error(StatusCode::NOT_FOUND, "session not found"),
        Err(e) => {
            tracing::error!(session_id, error = %e, "session deactivation failed");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "session store unavailable")
        }
    }
}
