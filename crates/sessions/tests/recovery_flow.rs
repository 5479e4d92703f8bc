//! Staged recovery and three-way transport resolution over the in-memory
//! backend, with stub transports standing in for real connections.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use ar_domain::config::{RecoveryConfig, SessionsConfig};
use ar_domain::error::{Error, Result};
use ar_sessions::{
    AttemptTracker, MemoryBackend, RecoveryOrchestrator, RecoveryStage, SessionStore,
    SessionTransport, TransportFactory, TransportRegistry, TransportResolution, UserType,
};

struct StubTransport {
    alive: AtomicBool,
}

impl StubTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
        })
    }
}

impl SessionTransport for StubTransport {
    fn kind(&self) -> &str {
        "stub"
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

struct StubFactory {
    constructed: AtomicU32,
    fail: AtomicBool,
}

impl StubFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            constructed: AtomicU32::new(0),
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TransportFactory for StubFactory {
    async fn construct(
        &self,
        _session_id: &str,
        _server_name: &str,
    ) -> Result<Arc<dyn SessionTransport>> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Error::Other("upstream refused connection".into()));
        }
        self.constructed.fetch_add(1, Ordering::Relaxed);
        Ok(StubTransport::new())
    }
}

struct Fixture {
    backend: Arc<MemoryBackend>,
    store: Arc<SessionStore>,
    registry: Arc<TransportRegistry>,
    factory: Arc<StubFactory>,
    orchestrator: RecoveryOrchestrator,
}

fn fixture() -> Fixture {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(SessionStore::new(
        backend.clone(),
        SessionsConfig::default(),
    ));
    let registry = Arc::new(TransportRegistry::new(store.clone()));
    let tracker = Arc::new(AttemptTracker::new(&RecoveryConfig::default()));
    let factory = StubFactory::new();
    let orchestrator = RecoveryOrchestrator::new(
        store.clone(),
        registry.clone(),
        tracker,
        factory.clone(),
        "gateway",
    );
    Fixture {
        backend,
        store,
        registry,
        factory,
        orchestrator,
    }
}

#[tokio::test]
async fn resolution_distinguishes_unknown_lost_and_live() {
    let f = fixture();

    assert!(matches!(
        f.registry.resolve("s1").await.unwrap(),
        TransportResolution::Unknown
    ));

    // Existence-only binding: known in the store, no handle here.
    f.registry.bind("s1", None, "gateway").await.unwrap();
    assert!(matches!(
        f.registry.resolve("s1").await.unwrap(),
        TransportResolution::KnownButLost
    ));

    let transport = StubTransport::new();
    f.registry
        .bind("s1", Some(transport.clone()), "gateway")
        .await
        .unwrap();
    assert!(matches!(
        f.registry.resolve("s1").await.unwrap(),
        TransportResolution::Live(_)
    ));

    // A dead handle is evicted and the durable record takes over.
    transport.alive.store(false, Ordering::Relaxed);
    assert!(matches!(
        f.registry.resolve("s1").await.unwrap(),
        TransportResolution::KnownButLost
    ));
    assert_eq!(f.registry.local_count(), 0);

    assert!(f.registry.unbind("s1").await.unwrap());
    assert!(matches!(
        f.registry.resolve("s1").await.unwrap(),
        TransportResolution::Unknown
    ));
}

#[tokio::test]
async fn reattaches_when_application_session_survives() {
    let f = fixture();
    f.store
        .create("s1", "client-1", "hash-1", UserType::Individual, Default::default())
        .await
        .unwrap();

    let recovered = f.orchestrator.recover("s1").await.unwrap();
    assert_eq!(recovered.stage, RecoveryStage::Reattached);
    assert_eq!(f.factory.constructed.load(Ordering::Relaxed), 1);

    // The session record was preserved, not rebuilt.
    let session = f.store.get("s1").await.unwrap().unwrap();
    assert_eq!(session.client_id, "client-1");
    assert!(session.payload.get("recovered").is_none());

    assert!(matches!(
        f.registry.resolve("s1").await.unwrap(),
        TransportResolution::Live(_)
    ));
}

#[tokio::test]
async fn rebuilds_when_nothing_survives() {
    let f = fixture();

    let recovered = f.orchestrator.recover("abcdef1234567890").await.unwrap();
    assert_eq!(recovered.stage, RecoveryStage::Rebuilt);

    let session = f.store.get("abcdef1234567890").await.unwrap().unwrap();
    assert_eq!(session.client_id, "recovered_client_abcdef12");
    assert_eq!(session.payload.get("recovered"), Some(&json!(true)));
    assert!(session.payload.get("recovery_time").is_some());
    // Rebuilt without a known owner; adopted on the next authenticated use.
    assert!(session.identity_hash.is_empty());
}

#[tokio::test]
async fn returns_live_handle_without_constructing() {
    let f = fixture();
    f.registry
        .bind("s1", Some(StubTransport::new()), "gateway")
        .await
        .unwrap();

    let recovered = f.orchestrator.recover("s1").await.unwrap();
    assert_eq!(recovered.stage, RecoveryStage::LocalHit);
    assert_eq!(f.factory.constructed.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn budget_exhaustion_stops_recovery_without_store_writes() {
    let f = fixture();
    f.factory.fail.store(true, Ordering::Relaxed);

    for _ in 0..3 {
        let err = f.orchestrator.recover("s1").await.unwrap_err();
        assert!(matches!(err, Error::TransportConstruction(_)));
    }

    // Fourth attempt is rejected at the gate before any backend access.
    f.backend.set_available(false);
    let err = f.orchestrator.recover("s1").await.unwrap_err();
    match err {
        Error::RecoveryExhausted {
            session_id,
            attempts,
        } => {
            assert_eq!(session_id, "s1");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected RecoveryExhausted, got {other}"),
    }
}

#[tokio::test]
async fn failed_construction_surfaces_and_leaves_no_binding() {
    let f = fixture();
    f.store
        .create("s1", "client-1", "hash-1", UserType::Individual, Default::default())
        .await
        .unwrap();
    f.factory.fail.store(true, Ordering::Relaxed);

    assert!(f.orchestrator.recover("s1").await.is_err());
    assert!(matches!(
        f.registry.resolve("s1").await.unwrap(),
        TransportResolution::Unknown
    ));

    // A later attempt within the budget succeeds once the upstream is back.
    f.factory.fail.store(false, Ordering::Relaxed);
    let recovered = f.orchestrator.recover("s1").await.unwrap();
    assert_eq!(recovered.stage, RecoveryStage::Reattached);
}
