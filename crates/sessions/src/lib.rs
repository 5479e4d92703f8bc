//! Session management for Anteroom.
//!
//! Implements the session subsystem behind the tool front door: a
//! TTL-backed store over a shared key-value backend, identity-partitioned
//! multi-tenant session lookup, a two-tier transport registry (durable
//! existence record + process-local handle), staged recovery with a
//! per-session attempt budget, and best-effort passive discovery from
//! diagnostic lines.

pub mod backend;
pub mod discovery;
pub mod health;
pub mod identity;
pub mod recovery;
pub mod registry;
pub mod store;
pub mod tenant;

pub use backend::{KvBackend, MemoryBackend};
pub use discovery::{DiscoveryStats, LogDiscovery};
pub use health::{HealthMonitor, HealthSnapshot};
pub use identity::{AuthMethod, Identity, IdentityResolver, RequestMetadata, UserType};
pub use recovery::{
    Admission, AttemptTracker, Recovered, RecoveryOrchestrator, RecoveryStage, RecoveryStats,
    TransportFactory,
};
pub use registry::{SessionTransport, TransportRegistry, TransportResolution};
pub use store::{AppSession, CreateOutcome, SessionStore, StoreStats, TransportRecord};
pub use tenant::SessionDirectory;
