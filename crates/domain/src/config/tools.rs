use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub threat_intel: ThreatIntelConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Threat-intel lookup upstream (VirusTotal-shaped v3 API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIntelConfig {
    /// Environment variable holding the upstream API key.  If the env var
    /// is unset, the handler reports `not_configured`.
    #[serde(default = "d_ti_key_env")]
    pub api_key_env: String,

    #[serde(default = "d_ti_base_url")]
    pub base_url: String,
}

impl Default for ThreatIntelConfig {
    fn default() -> Self {
        Self {
            api_key_env: d_ti_key_env(),
            base_url: d_ti_base_url(),
        }
    }
}

/// Restricted database query handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Environment variable holding the database DSN.
    #[serde(default = "d_db_url_env")]
    pub url_env: String,

    /// The only table SELECT queries may read from.
    #[serde(default = "d_allowed_table")]
    pub allowed_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: d_db_url_env(),
            allowed_table: d_allowed_table(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_ti_key_env() -> String {
    "VIRUSTOTAL_API_KEY".into()
}
fn d_ti_base_url() -> String {
    "https://www.virustotal.com/api/v3".into()
}
fn d_db_url_env() -> String {
    "DATABASE_URL".into()
}
fn d_allowed_table() -> String {
    "employees".into()
}
