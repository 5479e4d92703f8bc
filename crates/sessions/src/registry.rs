//! Transport registry — two-tier tracking of live transports.
//!
//! The local map holds the actual transport objects and is authoritative
//! for liveness within this process; it never crosses the process
//! boundary. The durable record in the shared store only asserts that a
//! transport exists (kind and server name), so another process can detect
//! it without being able to reconstruct it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use ar_domain::error::Result;
use ar_domain::trace::TraceEvent;

use crate::store::{SessionStore, TransportRecord};

/// Transport kind recorded for existence-only bindings (no local object).
const REFERENCE_KIND: &str = "reference";

/// A process-local transport handle. The registry never serializes these;
/// only their existence is mirrored into the store.
pub trait SessionTransport: Send + Sync {
    fn kind(&self) -> &str;
    fn is_alive(&self) -> bool;
}

/// Outcome of [`TransportRegistry::resolve`]. The three cases are
/// distinct on purpose: "existed but must be recreated" and "never
/// registered" demand different handling from the caller.
pub enum TransportResolution {
    /// A live handle is bound in this process.
    Live(Arc<dyn SessionTransport>),
    /// A durable existence record is present but this process holds no
    /// handle — the transport cannot be rebuilt from the record alone.
    KnownButLost,
    /// No record anywhere: the transport never existed.
    Unknown,
}

pub struct TransportRegistry {
    store: Arc<SessionStore>,
    local: RwLock<HashMap<String, Arc<dyn SessionTransport>>>,
}

impl TransportRegistry {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            local: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a transport to a session id: write the durable existence
    /// record and, when an object is supplied, keep it in the local map.
    /// `None` records existence only (e.g. observed from diagnostics).
    pub async fn bind(
        &self,
        session_id: &str,
        transport: Option<Arc<dyn SessionTransport>>,
        server_name: &str,
    ) -> Result<()> {
        let kind = transport
            .as_ref()
            .map(|t| t.kind().to_owned())
            .unwrap_or_else(|| REFERENCE_KIND.to_owned());
        let now = Utc::now();
        let record = TransportRecord {
            session_id: session_id.to_owned(),
            transport_kind: kind.clone(),
            server_name: server_name.to_owned(),
            created_at: now,
            last_accessed: now,
            is_active: true,
        };
        self.store.put_transport(&record).await?;

        let existence_only = transport.is_none();
        if let Some(t) = transport {
            self.local.write().insert(session_id.to_owned(), t);
        }
        TraceEvent::TransportBound {
            session_id: session_id.to_owned(),
            transport_kind: kind,
            server_name: server_name.to_owned(),
            existence_only,
        }
        .emit();
        Ok(())
    }

    /// Resolve the transport for a session id.
    ///
    /// A dead local handle is evicted and resolution falls through to the
    /// durable record, which then reports [`TransportResolution::KnownButLost`].
    /// Inactive records resolve as [`TransportResolution::Unknown`].
    pub async fn resolve(&self, session_id: &str) -> Result<TransportResolution> {
        let local = { self.local.read().get(session_id).cloned() };
        if let Some(transport) = local {
            if transport.is_alive() {
                // Best-effort access refresh; a live local handle stays
                // authoritative even when the store is unreachable.
                if let Err(e) = self.store.touch_transport(session_id).await {
                    tracing::debug!(session_id, error = %e, "transport touch failed");
                }
                return Ok(TransportResolution::Live(transport));
            }
            self.local.write().remove(session_id);
        }

        match self.store.get_transport(session_id).await? {
            Some(record) if record.is_active => Ok(TransportResolution::KnownButLost),
            _ => Ok(TransportResolution::Unknown),
        }
    }

    /// Remove both the local handle and the durable record. `Ok(false)`
    /// when neither existed.
    pub async fn unbind(&self, session_id: &str) -> Result<bool> {
        let had_local = self.local.write().remove(session_id).is_some();
        let had_record = self.store.delete_transport(session_id).await?;
        if had_local || had_record {
            TraceEvent::TransportUnbound {
                session_id: session_id.to_owned(),
            }
            .emit();
        }
        Ok(had_local || had_record)
    }

    /// Refresh the durable record's access time and TTL.
    pub async fn touch(&self, session_id: &str) -> Result<bool> {
        self.store.touch_transport(session_id).await
    }

    /// Number of live handles held by this process.
    pub fn local_count(&self) -> usize {
        self.local.read().len()
    }
}
