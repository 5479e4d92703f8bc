/// Shared error type used across all Anteroom crates.
///
/// Plain absence (a session id that simply does not exist) is modeled as
/// `Ok(None)` / `Ok(false)` at the store layer; `SessionNotFound` exists
/// for callers that need to surface absence upward as a typed failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("recovery exhausted for session {session_id} after {attempts} attempt(s)")]
    RecoveryExhausted { session_id: String, attempts: u32 },

    #[error("transport construction failed: {0}")]
    TransportConstruction(String),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
