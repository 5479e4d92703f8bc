//! Read-only database tool with a table allowlist.
//!
//! The query guard is enforced here regardless of whether a connection is
//! configured: a denied query must never depend on runtime wiring to stay
//! denied. Execution itself requires an external driver and reports
//! `not_configured` until one is wired in.

use ar_domain::config::DatabaseConfig;
use ar_domain::tool::{ToolError, ToolResult};
use serde::Deserialize;

pub struct Database {
    allowed_table: String,
    dsn: Option<String>,
}

impl Database {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            allowed_table: config.allowed_table.clone(),
            dsn: std::env::var(&config.url_env).ok().filter(|v| !v.is_empty()),
        }
    }

    pub async fn query(&self, args: &serde_json::Value) -> ToolResult {
        #[derive(Deserialize)]
        struct Args {
            sql: String,
        }
        let args: Args = serde_json::from_value(args.clone())
            .map_err(|e| ToolError::invalid_args(e.to_string()))?;

        self.check_query(&args.sql)?;

        if self.dsn.is_none() {
            return Err(ToolError::not_configured("database connection is not set"));
        }
        // Guard passed and a DSN exists, but no driver is wired in yet.
        Err(ToolError::not_configured(
            "database execution is not available in this build",
        ))
    }

    pub async fn schema(&self) -> ToolResult {
        if self.dsn.is_none() {
            return Err(ToolError::not_configured("database connection is not set"));
        }
        Err(ToolError::not_configured(
            "database execution is not available in this build",
        ))
    }

    /// Allow only SELECT statements against the allowed table. A shallow
    /// check by intent: it blocks mistakes and the obvious mutations, not
    /// a hostile SQL parser bypass.
    fn check_query(&self, sql: &str) -> Result<(), ToolError> {
        let normalized = sql.trim().to_uppercase();
        if !normalized.starts_with("SELECT") {
            return Err(ToolError::denied("only SELECT queries are allowed"));
        }
        let after_from = normalized
            .split_once("FROM")
            .map(|(_, rest)| rest.trim_start())
            .unwrap_or("");
        let table_upper = self.allowed_table.to_uppercase();
        if !after_from.starts_with(&table_upper) {
            return Err(ToolError::denied(format!(
                "this tool can only query the '{}' table",
                self.allowed_table
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_domain::tool::ToolErrorKind;
    use serde_json::json;

    fn db() -> Database {
        Database {
            allowed_table: "employees".into(),
            dsn: None,
        }
    }

    #[test]
    fn select_on_allowed_table_passes_guard() {
        assert!(db()
            .check_query("SELECT name, position FROM employees WHERE id = 1")
            .is_ok());
        assert!(db().check_query("  select * from EMPLOYEES  ").is_ok());
    }

    #[test]
    fn mutations_denied() {
        for sql in [
            "DELETE FROM employees",
            "INSERT INTO employees VALUES (1)",
            "UPDATE employees SET name = 'x'",
            "DROP TABLE employees",
        ] {
            let err = db().check_query(sql).unwrap_err();
            assert_eq!(err.kind, ToolErrorKind::Denied, "not denied: {sql}");
        }
    }

    #[test]
    fn other_tables_denied() {
        let err = db().check_query("SELECT * FROM salaries").unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Denied);
        let err = db().check_query("SELECT 1").unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Denied);
    }

    #[tokio::test]
    async fn guard_runs_before_configuration_check() {
        let err = db()
            .query(&json!({"sql": "DELETE FROM employees"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Denied);

        let err = db()
            .query(&json!({"sql": "SELECT * FROM employees"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::NotConfigured);
    }
}
