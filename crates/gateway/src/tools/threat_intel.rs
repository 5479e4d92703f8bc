//! Threat-intelligence lookups against the VirusTotal v3 API.

use ar_domain::config::ThreatIntelConfig;
use ar_domain::tool::{ToolError, ToolResult};
use serde::Deserialize;

pub struct ThreatIntel {
    client: reqwest::Client,
    base_url: String,
    /// Read once at startup from the configured environment variable.
    api_key: Option<String>,
}

impl ThreatIntel {
    pub fn from_config(config: &ThreatIntelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()),
        }
    }

    pub async fn ip_report(&self, args: &serde_json::Value) -> ToolResult {
        #[derive(Deserialize)]
        struct Args {
            ip_address: String,
        }
        let args: Args = parse_args(args)?;
        self.fetch(&format!("ip_addresses/{}", args.ip_address)).await
    }

    pub async fn domain_report(&self, args: &serde_json::Value) -> ToolResult {
        #[derive(Deserialize)]
        struct Args {
            domain: String,
        }
        let args: Args = parse_args(args)?;
        self.fetch(&format!("domains/{}", args.domain)).await
    }

    async fn fetch(&self, path: &str) -> ToolResult {
        let Some(api_key) = &self.api_key else {
            return Err(ToolError::not_configured(
                "threat intel API key is not set",
            ));
        };

        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("x-apikey", api_key)
            .send()
            .await
            .map_err(|e| ToolError::upstream(format!("request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::upstream(format!("unparseable upstream response: {e}")))?;

        if !status.is_success() {
            // Surface the upstream error message when the body carries one.
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("upstream error");
            return Err(ToolError::upstream(format!(
                "{message} (status {})",
                status.as_u16()
            )));
        }
        Ok(body)
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: &serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::invalid_args(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_domain::tool::ToolErrorKind;
    use serde_json::json;

    fn unconfigured() -> ThreatIntel {
        ThreatIntel {
            client: reqwest::Client::new(),
            base_url: "https://www.virustotal.com/api/v3".into(),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn missing_key_reports_not_configured() {
        let ti = unconfigured();
        let err = ti.ip_report(&json!({"ip_address": "8.8.8.8"})).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn missing_args_rejected_before_network() {
        let ti = unconfigured();
        let err = ti.domain_report(&json!({})).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidArgs);
    }
}
