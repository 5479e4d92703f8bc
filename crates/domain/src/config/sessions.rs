use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session store and tenancy configuration.
///
/// The window and TTL values match the source deployment's constants but
/// are configurable rather than hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Sliding TTL applied by every mutating store operation, in seconds.
    #[serde(default = "d_default_ttl")]
    pub default_ttl_secs: u64,

    /// Residual TTL applied on deactivation so concurrent readers can
    /// still observe the `is_active = false` transition, in seconds.
    #[serde(default = "d_grace_ttl")]
    pub grace_ttl_secs: u64,

    /// Span within which a new session request from the same identity is
    /// satisfied by that identity's most recent session instead of
    /// creating a fresh one, in seconds.
    #[serde(default = "d_reuse_window")]
    pub reuse_window_secs: u64,

    /// Key namespace for application session records.
    #[serde(default = "d_app_prefix")]
    pub app_prefix: String,

    /// Key namespace for transport existence records.
    #[serde(default = "d_transport_prefix")]
    pub transport_prefix: String,

    /// Key namespace for per-identity session-id index sets.
    #[serde(default = "d_index_prefix")]
    pub index_prefix: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: d_default_ttl(),
            grace_ttl_secs: d_grace_ttl(),
            reuse_window_secs: d_reuse_window(),
            app_prefix: d_app_prefix(),
            transport_prefix: d_transport_prefix(),
            index_prefix: d_index_prefix(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Recovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Recovery admission budget.  The attempt counter is process-local: a
/// caller bounced between N processes gets N times this budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Attempts admitted per session id within one cooldown window.
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,

    /// Cooldown window, in seconds.  Counters reset once it elapses with
    /// no new attempts; counter records are garbage-collected after two
    /// windows of inactivity.
    #[serde(default = "d_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            cooldown_secs: d_cooldown(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Passive discovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Passive log-discovery configuration.  Best-effort side channel; never
/// a dependency of core correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,

    /// Maximum number of already-processed session ids remembered for
    /// de-duplication (FIFO eviction beyond this).
    #[serde(default = "d_processed_cap")]
    pub processed_cap: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            processed_cap: d_processed_cap(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_default_ttl() -> u64 {
    3600
}
fn d_grace_ttl() -> u64 {
    300
}
fn d_reuse_window() -> u64 {
    300
}
fn d_app_prefix() -> String {
    "mcp_session:".into()
}
fn d_transport_prefix() -> String {
    "mcp_transport:".into()
}
fn d_index_prefix() -> String {
    "mcp_user_index:".into()
}
fn d_max_attempts() -> u32 {
    3
}
fn d_cooldown() -> u64 {
    300
}
fn d_processed_cap() -> usize {
    10_000
}
fn d_true() -> bool {
    true
}
