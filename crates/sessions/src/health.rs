//! Aggregated health snapshot for the session subsystem.
//!
//! Strictly read-only and fail-open: an unreachable backend produces a
//! snapshot that says so, never an error. Counts may race with concurrent
//! expiry; this surface is for operators, not for control flow.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::backend::KvBackend;
use crate::discovery::{DiscoveryStats, LogDiscovery};
use crate::recovery::{AttemptTracker, RecoveryStats};
use crate::registry::TransportRegistry;
use crate::store::SessionStore;

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub backend_reachable: bool,
    pub application_sessions: usize,
    pub transport_sessions: usize,
    /// Live handles held by this process (subset of `transport_sessions`).
    pub local_transports: usize,
    pub user_type_distribution: HashMap<String, usize>,
    pub recovery: RecoveryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryStats>,
}

pub struct HealthMonitor {
    backend: Arc<dyn KvBackend>,
    store: Arc<SessionStore>,
    registry: Arc<TransportRegistry>,
    tracker: Arc<AttemptTracker>,
    discovery: Option<Arc<LogDiscovery>>,
}

impl HealthMonitor {
    pub fn new(
        backend: Arc<dyn KvBackend>,
        store: Arc<SessionStore>,
        registry: Arc<TransportRegistry>,
        tracker: Arc<AttemptTracker>,
        discovery: Option<Arc<LogDiscovery>>,
    ) -> Self {
        Self {
            backend,
            store,
            registry,
            tracker,
            discovery,
        }
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        let backend_reachable = self.backend.ping().await.is_ok();

        let (application_sessions, transport_sessions, user_type_distribution) =
            if backend_reachable {
                let stats = self.store.stats().await.ok();
                let transports = self.store.list_transports().await.ok();
                match (stats, transports) {
                    (Some(stats), Some(transports)) => (
                        stats.active_sessions,
                        transports.len(),
                        stats.user_type_distribution,
                    ),
                    _ => (0, 0, HashMap::new()),
                }
            } else {
                (0, 0, HashMap::new())
            };

        HealthSnapshot {
            backend_reachable,
            application_sessions,
            transport_sessions,
            local_transports: self.registry.local_count(),
            user_type_distribution,
            recovery: self.tracker.stats(),
            discovery: self.discovery.as_ref().map(|d| d.stats()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_domain::config::{RecoveryConfig, SessionsConfig};
    use crate::backend::MemoryBackend;
    use crate::identity::UserType;

    fn monitor() -> (HealthMonitor, Arc<MemoryBackend>, Arc<SessionStore>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(SessionStore::new(
            backend.clone(),
            SessionsConfig::default(),
        ));
        let registry = Arc::new(TransportRegistry::new(store.clone()));
        let tracker = Arc::new(AttemptTracker::new(&RecoveryConfig::default()));
        let monitor = HealthMonitor::new(
            backend.clone() as Arc<dyn KvBackend>,
            store.clone(),
            registry,
            tracker,
            None,
        );
        (monitor, backend, store)
    }

    #[tokio::test]
    async fn counts_active_sessions_by_user_type() {
        let (monitor, _, store) = monitor();
        store
            .create("s1", "c1", "h1", UserType::Individual, Default::default())
            .await
            .unwrap();
        store
            .create("s2", "c2", "h2", UserType::Individual, Default::default())
            .await
            .unwrap();
        store
            .create("s3", "c3", "h3", UserType::Anonymous, Default::default())
            .await
            .unwrap();
        store.deactivate("s3").await.unwrap();

        let snapshot = monitor.snapshot().await;
        assert!(snapshot.backend_reachable);
        assert_eq!(snapshot.application_sessions, 2);
        assert_eq!(snapshot.user_type_distribution.get("individual"), Some(&2));
        assert_eq!(snapshot.user_type_distribution.get("anonymous"), None);
    }

    #[tokio::test]
    async fn outage_yields_snapshot_not_error() {
        let (monitor, backend, store) = monitor();
        store
            .create("s1", "c1", "h1", UserType::Individual, Default::default())
            .await
            .unwrap();
        backend.set_available(false);

        let snapshot = monitor.snapshot().await;
        assert!(!snapshot.backend_reachable);
        assert_eq!(snapshot.application_sessions, 0);
        assert_eq!(snapshot.recovery.max_attempts, 3);
    }
}
