//! Built-in tool endpoints behind the session front door.
//!
//! Verbs are namespaced `<tool>.<operation>` and dispatched by the
//! router. Tool failures are values ([`ToolError`]), not HTTP errors;
//! the API layer decides how to surface them.

pub mod calculator;
pub mod database;
pub mod threat_intel;

use ar_domain::config::ToolsConfig;
use ar_domain::tool::{ToolError, ToolRequest, ToolResult};

use database::Database;
use threat_intel::ThreatIntel;

pub struct ToolRouter {
    threat_intel: ThreatIntel,
    database: Database,
}

impl ToolRouter {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            threat_intel: ThreatIntel::from_config(&config.threat_intel),
            database: Database::from_config(&config.database),
        }
    }

    pub async fn dispatch(&self, request: &ToolRequest) -> ToolResult {
        match request.verb.as_str() {
            "calculator.add" => calculator::add(&request.args),
            "calculator.subtract" => calculator::subtract(&request.args),
            "calculator.multiply" => calculator::multiply(&request.args),
            "calculator.divide" => calculator::divide(&request.args),
            "threat_intel.ip_report" => self.threat_intel.ip_report(&request.args).await,
            "threat_intel.domain_report" => self.threat_intel.domain_report(&request.args).await,
            "database.query" => self.database.query(&request.args).await,
            "database.schema" => self.database.schema().await,
            other => Err(ToolError::unknown_verb(other)),
        }
    }

    /// Verbs this router can dispatch, for the diagnostics surface.
    pub fn verbs(&self) -> &'static [&'static str] {
        &[
            "calculator.add",
            "calculator.subtract",
            "calculator.multiply",
            "calculator.divide",
            "threat_intel.ip_report",
            "threat_intel.domain_report",
            "database.query",
            "database.schema",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_verb_is_a_tool_error() {
        let router = ToolRouter::new(&ToolsConfig::default());
        let err = router
            .dispatch(&ToolRequest {
                verb: "calculator.modulo".into(),
                args: json!({"a": 1, "b": 2}),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ar_domain::tool::ToolErrorKind::UnknownVerb);
    }
}
