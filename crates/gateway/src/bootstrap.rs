//! AppState construction and background-task spawning extracted from
//! `main.rs`, so tests and CLI commands can boot the full runtime without
//! an HTTP listener.

use std::sync::Arc;

use ar_domain::config::{Config, ConfigSeverity};
use ar_sessions::{
    AttemptTracker, HealthMonitor, IdentityResolver, KvBackend, LogDiscovery, MemoryBackend,
    RecoveryOrchestrator, SessionDirectory, SessionStore, TransportRegistry,
};

use crate::state::AppState;
use crate::tools::ToolRouter;
use crate::transport::HttpTransportFactory;

/// Server name recorded on transports this process binds.
const SERVER_NAME: &str = "anteroom";

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Shared backend ───────────────────────────────────────────────
    let backend: Arc<dyn KvBackend> = Arc::new(MemoryBackend::new());
    tracing::info!("in-process key-value backend ready");

    // ── Session store + directory ────────────────────────────────────
    let store = Arc::new(SessionStore::new(backend.clone(), config.sessions.clone()));
    let directory = Arc::new(SessionDirectory::new(store.clone(), &config.sessions));
    tracing::info!(
        default_ttl_secs = config.sessions.default_ttl_secs,
        reuse_window_secs = config.sessions.reuse_window_secs,
        "session store ready"
    );

    // ── Transport registry + recovery ────────────────────────────────
    let registry = Arc::new(TransportRegistry::new(store.clone()));
    let tracker = Arc::new(AttemptTracker::new(&config.recovery));
    let recovery = Arc::new(RecoveryOrchestrator::new(
        store.clone(),
        registry.clone(),
        tracker.clone(),
        Arc::new(HttpTransportFactory),
        SERVER_NAME,
    ));
    tracing::info!(
        max_attempts = config.recovery.max_attempts,
        cooldown_secs = config.recovery.cooldown_secs,
        "transport registry + recovery ready"
    );

    // ── Passive discovery (optional) ─────────────────────────────────
    let discovery = if config.discovery.enabled {
        let d = Arc::new(LogDiscovery::new(
            directory.clone(),
            registry.clone(),
            &config.discovery,
        )?);
        tracing::info!(
            processed_cap = config.discovery.processed_cap,
            "log discovery ready"
        );
        Some(d)
    } else {
        tracing::info!("log discovery disabled");
        None
    };

    // ── Health monitor ───────────────────────────────────────────────
    let health = Arc::new(HealthMonitor::new(
        backend.clone(),
        store.clone(),
        registry.clone(),
        tracker,
        discovery.clone(),
    ));

    // ── Tool router ──────────────────────────────────────────────────
    let tools = Arc::new(ToolRouter::new(&config.tools));
    tracing::info!(verbs = tools.verbs().len(), "tool router ready");

    Ok(AppState {
        config,
        backend,
        store,
        directory,
        identity: IdentityResolver::new(),
        registry,
        recovery,
        discovery,
        health,
        tools,
    })
}

/// Spawn periodic maintenance loops. Currently only the recovery-tracker
/// GC, which drops attempt counters idle for two cooldown windows.
pub fn spawn_background_tasks(state: &AppState) {
    let recovery = state.recovery.clone();
    let interval = std::time::Duration::from_secs(state.config.recovery.cooldown_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately, skip it
        loop {
            ticker.tick().await;
            recovery.tracker().gc();
        }
    });
}
