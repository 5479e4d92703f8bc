use serde::Serialize;

/// Structured trace events emitted across all Anteroom crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        identity_hash: String,
        user_type: String,
    },
    SessionReused {
        presented_id: String,
        reused_id: String,
        identity_hash: String,
        idle_secs: i64,
    },
    SessionDeactivated {
        session_id: String,
        grace_ttl_secs: u64,
    },
    TransportBound {
        session_id: String,
        transport_kind: String,
        server_name: String,
        existence_only: bool,
    },
    TransportUnbound {
        session_id: String,
    },
    RecoveryAdmitted {
        session_id: String,
        attempt: u32,
    },
    RecoveryCompleted {
        session_id: String,
        stage: String,
    },
    RecoveryFailed {
        session_id: String,
        reason: String,
    },
    IdentityResolved {
        user_type: String,
        auth_method: String,
    },
    DiscoveryHit {
        session_id: String,
        had_credential: bool,
    },
    ToolInvoked {
        verb: String,
        session_id: String,
        duration_ms: u64,
        ok: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ar_event");
    }
}
