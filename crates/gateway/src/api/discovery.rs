//! Passive-discovery ingest endpoint.
//!
//! Connectors and log shippers push raw diagnostic lines here; the
//! scraper opportunistically extracts session ids from them. Per-line
//! failures are swallowed by the scraper, so this endpoint only fails
//! when discovery is disabled outright.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::api::api_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub lines: Vec<String>,
}

pub async fn ingest(State(state): State<AppState>, Json(body): Json<IngestBody>) -> Response {
    let Some(discovery) = &state.discovery else {
        return api_error(StatusCode::SERVICE_UNAVAILABLE, "log discovery is disabled");
    };
    for line in &body.lines {
        discovery.observe(line).await;
    }
    Json(discovery.stats()).into_response()
}
