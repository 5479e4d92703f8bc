//! TTL-backed session store over the shared key-value backend.
//!
//! Owns two record kinds: application sessions (the logical session —
//! owner, payload, timestamps) and transport records (durable existence
//! of a live connection, distinct from the connection object itself).
//! Every mutating call refreshes the record's TTL to the configured
//! default unless a shorter grace TTL is requested. All operations are
//! single-key atomic at the backend; there are no cross-key transactions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ar_domain::config::SessionsConfig;
use ar_domain::error::Result;
use ar_domain::trace::TraceEvent;

use crate::backend::KvBackend;
use crate::identity::UserType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The logical session record.
///
/// `session_id` is caller-supplied or caller-observed, not minted here in
/// the common path. `identity_hash` partitions sessions by tenant; an
/// empty hash marks a session recovered without a known owner (adopted on
/// the owner's next authenticated touch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSession {
    pub session_id: String,
    #[serde(default)]
    pub identity_hash: String,
    /// Denormalized from the resolved identity for the diagnostics surface.
    #[serde(default)]
    pub user_type: UserType,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "d_true")]
    pub is_active: bool,
}

/// Durable record that a live transport exists for a session id.
///
/// Stores kind/name metadata only — never serialized transport state.
/// The transport object itself is process-local and lost on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportRecord {
    pub session_id: String,
    pub transport_kind: String,
    pub server_name: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    #[serde(default = "d_true")]
    pub is_active: bool,
}

fn d_true() -> bool {
    true
}

/// Outcome of [`SessionStore::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A live record already exists under this id; the call was a no-op.
    AlreadyExists,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    backend: Arc<dyn KvBackend>,
    config: SessionsConfig,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KvBackend>, config: SessionsConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.config.default_ttl_secs)
    }

    pub fn grace_ttl(&self) -> Duration {
        Duration::from_secs(self.config.grace_ttl_secs)
    }

    fn app_key(&self, session_id: &str) -> String {
        format!("{}{}", self.config.app_prefix, session_id)
    }

    fn transport_key(&self, session_id: &str) -> String {
        format!("{}{}", self.config.transport_prefix, session_id)
    }

    fn index_key(&self, identity_hash: &str) -> String {
        format!("{}{}", self.config.index_prefix, identity_hash)
    }

    // ── Application sessions ─────────────────────────────────────────

    /// Create an application session under `session_id`.
    ///
    /// Returns [`CreateOutcome::AlreadyExists`] (without touching the
    /// record) when a live record is already present.
    pub async fn create(
        &self,
        session_id: &str,
        client_id: &str,
        identity_hash: &str,
        user_type: UserType,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<CreateOutcome> {
        if self.get(session_id).await?.is_some() {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let now = Utc::now();
        let session = AppSession {
            session_id: session_id.to_owned(),
            identity_hash: identity_hash.to_owned(),
            user_type,
            client_id: client_id.to_owned(),
            created_at: now,
            last_accessed: now,
            payload,
            is_active: true,
        };
        self.save(&session).await?;
        Ok(CreateOutcome::Created)
    }

    /// Look up an application session. Absence is `Ok(None)`, never an
    /// error; an unparseable record is treated as absent.
    pub async fn get(&self, session_id: &str) -> Result<Option<AppSession>> {
        let raw = self.backend.get(&self.app_key(session_id)).await?;
        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "discarding unparseable session record");
                None
            }
        }))
    }

    /// Write a session record back with the default sliding TTL.
    pub async fn save(&self, session: &AppSession) -> Result<()> {
        self.save_with_ttl(session, self.default_ttl()).await
    }

    pub async fn save_with_ttl(&self, session: &AppSession, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.backend
            .set_ex(&self.app_key(&session.session_id), &json, ttl)
            .await
    }

    /// Merge `partial` into the session's payload and refresh
    /// `last_accessed` and the TTL. `Ok(None)` when the session is absent.
    pub async fn update(
        &self,
        session_id: &str,
        partial: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<AppSession>> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(None);
        };
        for (k, v) in partial {
            session.payload.insert(k.clone(), v.clone());
        }
        session.last_accessed = Utc::now();
        self.save(&session).await?;
        Ok(Some(session))
    }

    /// Delete an application session. Idempotent: `Ok(false)` when the id
    /// is already absent, both times, never an error.
    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        self.backend.del(&self.app_key(session_id)).await
    }

    /// Reset the session's TTL without touching the record body.
    pub async fn extend(&self, session_id: &str, ttl: Duration) -> Result<bool> {
        self.backend.expire(&self.app_key(session_id), ttl).await
    }

    /// Soft-delete: mark inactive and rewrite with the short grace TTL so
    /// concurrent readers can observe the transition before expiry.
    pub async fn deactivate(&self, session_id: &str) -> Result<bool> {
        let Some(mut session) = self.get(session_id).await? else {
            return Ok(false);
        };
        session.is_active = false;
        self.save_with_ttl(&session, self.grace_ttl()).await?;
        TraceEvent::SessionDeactivated {
            session_id: session_id.to_owned(),
            grace_ttl_secs: self.config.grace_ttl_secs,
        }
        .emit();
        Ok(true)
    }

    /// Best-effort enumeration of live application session ids. May race
    /// with concurrent expiry.
    pub async fn list(&self) -> Result<Vec<String>> {
        let keys = self.backend.keys(&self.config.app_prefix).await?;
        Ok(keys
            .into_iter()
            .map(|k| k[self.config.app_prefix.len()..].to_owned())
            .collect())
    }

    // ── Transport records ────────────────────────────────────────────

    pub async fn put_transport(&self, record: &TransportRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.backend
            .set_ex(&self.transport_key(&record.session_id), &json, self.default_ttl())
            .await
    }

    pub async fn get_transport(&self, session_id: &str) -> Result<Option<TransportRecord>> {
        let raw = self.backend.get(&self.transport_key(session_id)).await?;
        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "discarding unparseable transport record");
                None
            }
        }))
    }

    /// Refresh a transport record's access time and TTL.
    pub async fn touch_transport(&self, session_id: &str) -> Result<bool> {
        let Some(mut record) = self.get_transport(session_id).await? else {
            return Ok(false);
        };
        record.last_accessed = Utc::now();
        self.put_transport(&record).await?;
        Ok(true)
    }

    pub async fn delete_transport(&self, session_id: &str) -> Result<bool> {
        self.backend.del(&self.transport_key(session_id)).await
    }

    pub async fn list_transports(&self) -> Result<Vec<String>> {
        let keys = self.backend.keys(&self.config.transport_prefix).await?;
        Ok(keys
            .into_iter()
            .map(|k| k[self.config.transport_prefix.len()..].to_owned())
            .collect())
    }

    // ── Per-identity index ───────────────────────────────────────────

    /// Add a session id to the identity's index set and refresh the set's
    /// TTL. Not atomic with the session write: readers must tolerate an
    /// index entry without its session and vice versa.
    pub async fn index_add(&self, identity_hash: &str, session_id: &str) -> Result<()> {
        let key = self.index_key(identity_hash);
        self.backend.sadd(&key, session_id).await?;
        self.backend.expire(&key, self.default_ttl()).await?;
        Ok(())
    }

    pub async fn index_remove(&self, identity_hash: &str, session_id: &str) -> Result<bool> {
        self.backend
            .srem(&self.index_key(identity_hash), session_id)
            .await
    }

    pub async fn index_members(&self, identity_hash: &str) -> Result<Vec<String>> {
        self.backend.smembers(&self.index_key(identity_hash)).await
    }

    pub async fn refresh_index(&self, identity_hash: &str) -> Result<()> {
        self.backend
            .expire(&self.index_key(identity_hash), self.default_ttl())
            .await?;
        Ok(())
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Aggregate counts for the health surface. Walks every application
    /// session key; fine at this subsystem's session volumes.
    pub async fn stats(&self) -> Result<StoreStats> {
        let ids = self.list().await?;
        let mut active = 0usize;
        let mut distribution = std::collections::HashMap::new();
        for id in &ids {
            if let Some(session) = self.get(id).await? {
                if session.is_active {
                    active += 1;
                    *distribution
                        .entry(session.user_type.as_str().to_owned())
                        .or_insert(0usize) += 1;
                }
            }
        }
        Ok(StoreStats {
            total_session_keys: ids.len(),
            active_sessions: active,
            user_type_distribution: distribution,
        })
    }
}

/// Aggregate store counts for the health surface.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_session_keys: usize,
    pub active_sessions: usize,
    pub user_type_distribution: std::collections::HashMap<String, usize>,
}
