//! Multi-tenant session directory — find-or-create partitioned by
//! identity hash.
//!
//! Maps a resolved identity to its set of session ids and decides, per
//! request, whether to return the presented session, reuse the identity's
//! most recent one, or create a fresh record. Reuse within the configured
//! window avoids session churn for bursty short-lived reconnects, at the
//! cost of the returned id not always matching what the caller supplied.

use std::sync::Arc;

use chrono::Utc;

use ar_domain::config::SessionsConfig;
use ar_domain::error::Result;
use ar_domain::trace::TraceEvent;

use crate::identity::Identity;
use crate::store::{AppSession, SessionStore};

pub struct SessionDirectory {
    store: Arc<SessionStore>,
    reuse_window: chrono::Duration,
}

impl SessionDirectory {
    pub fn new(store: Arc<SessionStore>, config: &SessionsConfig) -> Self {
        Self {
            store,
            reuse_window: chrono::Duration::seconds(config.reuse_window_secs as i64),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Find or create the application session backing this request.
    ///
    /// 1. Direct hit on `(session_id, identity_hash)`: refresh and return.
    ///    Unowned recovered sessions (empty hash) are adopted here.
    /// 2. Any of the identity's active sessions touched within the reuse
    ///    window: return the most recent (ties to the lexicographically
    ///    smaller id).
    /// 3. Otherwise create a new session under the presented id.
    ///
    /// Every branch writes through to the store and refreshes the
    /// identity's index TTL.
    pub async fn find_or_create(
        &self,
        session_id: &str,
        identity: &Identity,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<AppSession> {
        let identity_hash = identity.hash();
        let now = Utc::now();

        // 1. Direct lookup under the presented id.
        let direct = self.store.get(session_id).await?;
        if let Some(mut session) = direct.clone() {
            if session.is_active
                && (session.identity_hash == identity_hash
                    || session.identity_hash.is_empty())
            {
                session.identity_hash = identity_hash.clone();
                session.user_type = identity.user_type;
                for (k, v) in &payload {
                    session.payload.insert(k.clone(), v.clone());
                }
                session.last_accessed = now;
                self.store.save(&session).await?;
                self.store.index_add(&identity_hash, &session.session_id).await?;
                return Ok(session);
            }
        }

        // 2. Reuse the identity's most recently touched session.
        let candidates = self.active_sessions_by_hash(&identity_hash).await?;
        let recent = candidates
            .into_iter()
            // Strictly inside the window: exactly reuse_window idle is
            // already too old.
            .filter(|s| now.signed_duration_since(s.last_accessed) < self.reuse_window)
            .max_by(|a, b| {
                a.last_accessed
                    .cmp(&b.last_accessed)
                    // On equal timestamps the lexicographically smaller id
                    // wins, for cross-process determinism.
                    .then_with(|| b.session_id.cmp(&a.session_id))
            });
        if let Some(mut session) = recent {
            let idle_secs = now.signed_duration_since(session.last_accessed).num_seconds();
            for (k, v) in &payload {
                session.payload.insert(k.clone(), v.clone());
            }
            session.last_accessed = now;
            self.store.save(&session).await?;
            self.store.refresh_index(&identity_hash).await?;
            TraceEvent::SessionReused {
                presented_id: session_id.to_owned(),
                reused_id: session.session_id.clone(),
                identity_hash: identity_hash.clone(),
                idle_secs,
            }
            .emit();
            return Ok(session);
        }

        // 3. Create. If the presented id is held by another tenant (or by
        // a dead record we must not clobber before its grace expiry),
        // mint a tenant-suffixed id instead of overwriting.
        let new_id = match &direct {
            Some(existing)
                if !existing.identity_hash.is_empty()
                    && existing.identity_hash != identity_hash =>
            {
                format!("{}-{}", session_id, &identity_hash[..8])
            }
            _ => session_id.to_owned(),
        };
        let session = AppSession {
            session_id: new_id.clone(),
            identity_hash: identity_hash.clone(),
            user_type: identity.user_type,
            client_id: format!(
                "mcp_client_{}_{}",
                identity.user_type.as_str(),
                &identity_hash[..8]
            ),
            created_at: now,
            last_accessed: now,
            payload,
            is_active: true,
        };
        self.store.save(&session).await?;
        self.store.index_add(&identity_hash, &new_id).await?;
        TraceEvent::SessionCreated {
            session_id: new_id,
            identity_hash,
            user_type: identity.user_type.as_str().to_owned(),
        }
        .emit();
        Ok(session)
    }

    /// All active sessions belonging to an identity.
    pub async fn active_sessions(&self, identity: &Identity) -> Result<Vec<AppSession>> {
        self.active_sessions_by_hash(&identity.hash()).await
    }

    /// Walk the identity's index set. Dangling entries (id in the index
    /// but the session record expired first, or owned by someone else
    /// after an id collision) are skipped, never an error.
    async fn active_sessions_by_hash(&self, identity_hash: &str) -> Result<Vec<AppSession>> {
        let ids = self.store.index_members(identity_hash).await?;
        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(session) = self.store.get(&id).await? {
                if session.is_active && session.identity_hash == identity_hash {
                    sessions.push(session);
                }
            }
        }
        Ok(sessions)
    }

    /// Deactivate one of the identity's sessions: soft-delete the record
    /// and drop it from the index. `Ok(false)` when the session is absent
    /// or owned by a different identity.
    pub async fn deactivate(&self, session_id: &str, identity: &Identity) -> Result<bool> {
        let identity_hash = identity.hash();
        let Some(session) = self.store.get(session_id).await? else {
            return Ok(false);
        };
        if session.identity_hash != identity_hash {
            return Ok(false);
        }
        let deactivated = self.store.deactivate(session_id).await?;
        self.store.index_remove(&identity_hash, session_id).await?;
        Ok(deactivated)
    }
}
