//! Tool invocation endpoint — the session-mediated front door.
//!
//! `POST /v1/tools/invoke` — resolve the caller's identity, find or
//! create their session, ensure a live transport (recovering if needed),
//! then dispatch the verb. Tool failures are not HTTP errors: the
//! response is 200 with `ok: false`. HTTP errors are reserved for the
//! session machinery itself.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use ar_domain::error::Error;
use ar_domain::tool::ToolRequest;
use ar_domain::trace::TraceEvent;
use ar_sessions::{RequestMetadata, TransportResolution};

use crate::api::api_error;
use crate::state::AppState;

/// Session id header, echoed back on every response.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

#[derive(Debug, Deserialize)]
pub struct InvokeParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn invoke_tool(
    State(state): State<AppState>,
    Query(params): Query<InvokeParams>,
    headers: HeaderMap,
    Json(request): Json<ToolRequest>,
) -> Response {
    let start = std::time::Instant::now();

    let presented_id = extract_session_id(&headers, params.session_id.as_deref());
    let meta = request_metadata(&headers);
    let identity = state.identity.resolve(&meta);

    // Find or create the application session for this caller.
    let mut payload = serde_json::Map::new();
    payload.insert("last_verb".into(), request.verb.clone().into());
    let session = match state
        .directory
        .find_or_create(&presented_id, &identity, payload)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "session resolution failed");
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "session store unavailable");
        }
    };

    // Ensure a live transport, recovering when the local handle is gone.
    let transport_ok = match state.registry.resolve(&session.session_id).await {
        Ok(TransportResolution::Live(_)) => true,
        Ok(_) => match state.recovery.recover(&session.session_id).await {
            Ok(_) => true,
            Err(Error::RecoveryExhausted { attempts, .. }) => {
                return api_error(
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("session recovery exhausted after {attempts} attempts"),
                );
            }
            Err(e) => {
                tracing::error!(session_id = %session.session_id, error = %e, "recovery failed");
                return api_error(StatusCode::SERVICE_UNAVAILABLE, "transport recovery failed");
            }
        },
        Err(e) => {
            tracing::error!(session_id = %session.session_id, error = %e, "transport resolution failed");
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "session store unavailable");
        }
    };
    debug_assert!(transport_ok);

    let result = state.tools.dispatch(&request).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    TraceEvent::ToolInvoked {
        verb: request.verb.clone(),
        session_id: session.session_id.clone(),
        duration_ms,
        ok: result.is_ok(),
    }
    .emit();

    let body = match result {
        Ok(value) => serde_json::json!({
            "session_id": session.session_id,
            "ok": true,
            "result": value,
            "duration_ms": duration_ms,
        }),
        Err(tool_error) => serde_json::json!({
            "session_id": session.session_id,
            "ok": false,
            "error": tool_error,
            "duration_ms": duration_ms,
        }),
    };
    ([(SESSION_ID_HEADER, session.session_id.clone())], Json(body)).into_response()
}

/// The session id the caller presented: `mcp-session-id` header first,
/// then the `session_id` query parameter, else a freshly minted id.
pub(crate) fn extract_session_id(headers: &HeaderMap, query_id: Option<&str>) -> String {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            query_id
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}

/// Identity-relevant request metadata pulled off the HTTP headers.
pub(crate) fn request_metadata(headers: &HeaderMap) -> RequestMetadata {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    RequestMetadata {
        authorization: header("authorization"),
        user_agent: header("user-agent"),
        client_ip: header("x-forwarded-for")
            .map(|v| v.split(',').next().unwrap_or("").trim().to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_takes_precedence_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_ID_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(
            extract_session_id(&headers, Some("from-query")),
            "from-header"
        );
        assert_eq!(
            extract_session_id(&HeaderMap::new(), Some("from-query")),
            "from-query"
        );
    }

    #[test]
    fn absent_id_is_minted() {
        let id = extract_session_id(&HeaderMap::new(), None);
        assert_eq!(id.len(), 32);
        assert_ne!(id, extract_session_id(&HeaderMap::new(), None));
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.1, 172.16.0.1"),
        );
        let meta = request_metadata(&headers);
        assert_eq!(meta.client_ip.as_deref(), Some("10.0.0.1"));
    }
}
