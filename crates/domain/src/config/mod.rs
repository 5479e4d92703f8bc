mod server;
mod sessions;
mod tools;

pub use server::*;
pub use sessions::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        // Key namespaces must not collide: a prefix that is itself a prefix
        // of another would let app sessions, transport records and user
        // indexes shadow each other in the shared backend.
        let prefixes = [
            ("sessions.app_prefix", &self.sessions.app_prefix),
            ("sessions.transport_prefix", &self.sessions.transport_prefix),
            ("sessions.index_prefix", &self.sessions.index_prefix),
        ];
        for (field, prefix) in &prefixes {
            if prefix.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: (*field).into(),
                    message: "key prefix must not be empty".into(),
                });
            }
        }
        for (i, (field_a, a)) in prefixes.iter().enumerate() {
            for (field_b, b) in prefixes.iter().skip(i + 1) {
                if a.starts_with(b.as_str()) || b.starts_with(a.as_str()) {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("{field_a} / {field_b}"),
                        message: "key prefixes must not shadow each other".into(),
                    });
                }
            }
        }

        if self.sessions.default_ttl_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "sessions.default_ttl_secs".into(),
                message: "TTL must be greater than 0".into(),
            });
        }

        if self.sessions.grace_ttl_secs >= self.sessions.default_ttl_secs {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "sessions.grace_ttl_secs".into(),
                message: "deactivation grace TTL is not shorter than the default TTL".into(),
            });
        }

        if self.recovery.max_attempts == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "recovery.max_attempts".into(),
                message: "max_attempts must be greater than 0".into(),
            });
        }

        errors
    }
}
