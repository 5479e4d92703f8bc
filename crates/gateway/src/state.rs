use std::sync::Arc;

use ar_domain::config::Config;
use ar_sessions::{
    HealthMonitor, IdentityResolver, KvBackend, LogDiscovery, RecoveryOrchestrator,
    SessionDirectory, SessionStore, TransportRegistry,
};

use crate::tools::ToolRouter;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core** — config and the shared key-value backend
/// - **Sessions** — store, directory, identity resolution
/// - **Transports** — registry and staged recovery
/// - **Diagnostics** — discovery scraper and health monitor
/// - **Tools** — verb dispatch
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub backend: Arc<dyn KvBackend>,

    // ── Sessions ──────────────────────────────────────────────────────
    pub store: Arc<SessionStore>,
    pub directory: Arc<SessionDirectory>,
    pub identity: IdentityResolver,

    // ── Transports ────────────────────────────────────────────────────
    pub registry: Arc<TransportRegistry>,
    pub recovery: Arc<RecoveryOrchestrator>,

    // ── Diagnostics ───────────────────────────────────────────────────
    /// `None` when passive discovery is disabled in config.
    pub discovery: Option<Arc<LogDiscovery>>,
    pub health: Arc<HealthMonitor>,

    // ── Tools ─────────────────────────────────────────────────────────
    pub tools: Arc<ToolRouter>,
}
