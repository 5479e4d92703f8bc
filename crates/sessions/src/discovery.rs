//! Passive session discovery from free-text diagnostic lines.
//!
//! Best-effort compensating mechanism, never a correctness path: a fixed
//! battery of patterns opportunistically extracts a session id and an
//! authorization-shaped credential from log output, then feeds the same
//! `find_or_create`/`bind` interfaces the primary path uses. Every
//! failure is swallowed and only counted for local diagnostics.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;

use ar_domain::config::DiscoveryConfig;
use ar_domain::error::{Error, Result};
use ar_domain::trace::TraceEvent;

use crate::identity::{IdentityResolver, RequestMetadata};
use crate::registry::{TransportRegistry, TransportResolution};
use crate::tenant::SessionDirectory;

/// Server name recorded on existence-only bindings made from log lines.
const DISCOVERY_SERVER_NAME: &str = "log_discovery";

/// Session-id shapes observed in the wild: URL parameters, JSON fields,
/// header-style lines, and the messages endpoint path, in both 32-hex
/// and 36-char hyphenated forms.
const SESSION_PATTERNS: &[&str] = &[
    r"session_id=([a-f0-9]{32})",
    r"session_id=([a-f0-9-]{36})",
    r#""session_id":\s*"([a-f0-9]{32})""#,
    r#""session_id":\s*"([a-f0-9-]{36})""#,
    r"session_id:\s*([a-f0-9]{32})",
    r"(?i)Session-ID:\s*([a-f0-9]{32})",
    r"(?i)mcp-session-id:\s*([a-f0-9]{32})",
    r"/messages/\?session_id=([a-f0-9]{32})",
];

const BEARER_PATTERNS: &[&str] = &[
    r"(?i)authorization:\s*bearer\s+([a-zA-Z0-9._-]+)",
    r#"(?i)"authorization":\s*"bearer\s+([a-zA-Z0-9._-]+)""#,
];

const APIKEY_PATTERN: &str = r"(?i)apikey\s+([a-zA-Z0-9._-]+)";
const IP_PATTERN: &str = r"(\d+\.\d+\.\d+\.\d+)";
const UA_PATTERN: &str = r#"(?i)user-agent['"]?:\s*['"]([^'"]+)['"]"#;

/// De-duplication memory with FIFO eviction. The source implementation
/// kept this unbounded; long-running processes with many distinct ids
/// would grow without limit, so we cap it.
struct SeenSet {
    set: HashSet<String>,
    order: VecDeque<String>,
    cap: usize,
}

impl SeenSet {
    fn new(cap: usize) -> Self {
        Self {
            set: HashSet::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.set.contains(id)
    }

    fn insert(&mut self, id: String) {
        if self.set.insert(id.clone()) {
            self.order.push_back(id);
            while self.order.len() > self.cap {
                if let Some(evicted) = self.order.pop_front() {
                    self.set.remove(&evicted);
                }
            }
        }
    }
}

/// Local diagnostics counters.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryStats {
    pub lines_observed: u64,
    pub sessions_matched: u64,
    pub sessions_recorded: u64,
    pub errors_swallowed: u64,
    pub ids_remembered: usize,
}

pub struct LogDiscovery {
    directory: Arc<SessionDirectory>,
    registry: Arc<TransportRegistry>,
    resolver: IdentityResolver,
    session_patterns: Vec<Regex>,
    bearer_patterns: Vec<Regex>,
    apikey_pattern: Regex,
    ip_pattern: Regex,
    ua_pattern: Regex,
    seen: Mutex<SeenSet>,
    lines_observed: AtomicU64,
    sessions_matched: AtomicU64,
    sessions_recorded: AtomicU64,
    errors_swallowed: AtomicU64,
}

impl LogDiscovery {
    pub fn new(
        directory: Arc<SessionDirectory>,
        registry: Arc<TransportRegistry>,
        config: &DiscoveryConfig,
    ) -> Result<Self> {
        Ok(Self {
            directory,
            registry,
            resolver: IdentityResolver::new(),
            session_patterns: compile_all(SESSION_PATTERNS)?,
            bearer_patterns: compile_all(BEARER_PATTERNS)?,
            apikey_pattern: compile(APIKEY_PATTERN)?,
            ip_pattern: compile(IP_PATTERN)?,
            ua_pattern: compile(UA_PATTERN)?,
            seen: Mutex::new(SeenSet::new(config.processed_cap)),
            lines_observed: AtomicU64::new(0),
            sessions_matched: AtomicU64::new(0),
            sessions_recorded: AtomicU64::new(0),
            errors_swallowed: AtomicU64::new(0),
        })
    }

    /// Feed one diagnostic line. Never raises into the caller: any store
    /// or registry failure is swallowed and counted. Unprocessed ids stay
    /// out of the seen-set so a later line can retry them.
    pub async fn observe(&self, line: &str) {
        self.lines_observed.fetch_add(1, Ordering::Relaxed);

        let Some(session_id) = self.extract_session_id(line) else {
            return;
        };
        if self.seen.lock().contains(&session_id) {
            return;
        }
        self.sessions_matched.fetch_add(1, Ordering::Relaxed);

        let meta = self.extract_metadata(line);
        let had_credential = meta.authorization.is_some();
        let identity = self.resolver.resolve(&meta);

        let mut payload = serde_json::Map::new();
        payload.insert("source".into(), "log_discovery".into());
        payload.insert("detected_from".into(), "diagnostic_line".into());
        payload.insert(
            "line".into(),
            line.chars().take(200).collect::<String>().into(),
        );
        payload.insert("original_session_id".into(), session_id.clone().into());

        if let Err(e) = self.record(&session_id, &identity, payload).await {
            self.errors_swallowed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(session_id, error = %e, "discovery record failed");
            return;
        }

        self.seen.lock().insert(session_id.clone());
        self.sessions_recorded.fetch_add(1, Ordering::Relaxed);
        TraceEvent::DiscoveryHit {
            session_id,
            had_credential,
        }
        .emit();
    }

    async fn record(
        &self,
        session_id: &str,
        identity: &crate::identity::Identity,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.directory
            .find_or_create(session_id, identity, payload)
            .await?;
        // Record transport existence only when nothing is known yet; a
        // live or recorded transport must not be downgraded to a reference.
        if let TransportResolution::Unknown = self.registry.resolve(session_id).await? {
            self.registry
                .bind(session_id, None, DISCOVERY_SERVER_NAME)
                .await?;
        }
        Ok(())
    }

    fn extract_session_id(&self, line: &str) -> Option<String> {
        for pattern in &self.session_patterns {
            if let Some(captures) = pattern.captures(line) {
                if let Some(m) = captures.get(1) {
                    return Some(m.as_str().to_lowercase());
                }
            }
        }
        None
    }

    fn extract_metadata(&self, line: &str) -> RequestMetadata {
        let authorization = self
            .bearer_patterns
            .iter()
            .find_map(|p| p.captures(line))
            .and_then(|c| c.get(1))
            .map(|m| format!("Bearer {}", m.as_str()))
            .or_else(|| {
                self.apikey_pattern
                    .captures(line)
                    .and_then(|c| c.get(1))
                    .map(|m| format!("ApiKey {}", m.as_str()))
            });
        let client_ip = self
            .ip_pattern
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned());
        let user_agent = self
            .ua_pattern
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned());
        RequestMetadata {
            authorization,
            user_agent,
            client_ip,
        }
    }

    pub fn stats(&self) -> DiscoveryStats {
        DiscoveryStats {
            lines_observed: self.lines_observed.load(Ordering::Relaxed),
            sessions_matched: self.sessions_matched.load(Ordering::Relaxed),
            sessions_recorded: self.sessions_recorded.load(Ordering::Relaxed),
            errors_swallowed: self.errors_swallowed.load(Ordering::Relaxed),
            ids_remembered: self.seen.lock().set.len(),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("discovery pattern: {e}")))
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_domain::config::SessionsConfig;
    use crate::backend::MemoryBackend;
    use crate::store::SessionStore;

    const SID: &str = "0123456789abcdef0123456789abcdef";

    fn discovery() -> (LogDiscovery, Arc<MemoryBackend>, Arc<SessionStore>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(SessionStore::new(
            backend.clone(),
            SessionsConfig::default(),
        ));
        let directory = Arc::new(SessionDirectory::new(
            store.clone(),
            &SessionsConfig::default(),
        ));
        let registry = Arc::new(TransportRegistry::new(store.clone()));
        let discovery =
            LogDiscovery::new(directory, registry, &DiscoveryConfig::default()).unwrap();
        (discovery, backend, store)
    }

    #[tokio::test]
    async fn extracts_ids_from_varied_shapes() {
        let (d, _, _) = discovery();
        let lines = [
            format!("GET /messages/?session_id={SID} HTTP/1.1"),
            format!(r#"{{"session_id": "{SID}"}}"#),
            format!("mcp-session-id: {SID}"),
            "Session-ID: 00000000000000000000000000000001".to_owned(),
            format!("session_id=123e4567-e89b-12d3-a456-42661417{}", "4000"),
        ];
        for line in &lines {
            assert!(d.extract_session_id(line).is_some(), "no match: {line}");
        }
        assert_eq!(d.extract_session_id("no ids here"), None);
    }

    #[tokio::test]
    async fn observe_creates_session_and_reference() {
        let (d, _, store) = discovery();
        let line = format!(
            "10.1.2.3 - mcp-session-id: {SID} authorization: bearer abc.def.sig"
        );
        d.observe(&line).await;

        let session = store.get(SID).await.unwrap().expect("session created");
        assert_eq!(
            session.payload.get("source").and_then(|v| v.as_str()),
            Some("log_discovery")
        );
        let record = store.get_transport(SID).await.unwrap().expect("reference");
        assert_eq!(record.transport_kind, "reference");
        assert_eq!(record.server_name, "log_discovery");
    }

    #[tokio::test]
    async fn duplicate_lines_processed_once() {
        let (d, _, _) = discovery();
        let line = format!("session_id={SID}");
        d.observe(&line).await;
        d.observe(&line).await;
        let stats = d.stats();
        assert_eq!(stats.sessions_matched, 1);
        assert_eq!(stats.sessions_recorded, 1);
        assert_eq!(stats.lines_observed, 2);
    }

    #[tokio::test]
    async fn backend_outage_is_swallowed_and_retryable() {
        let (d, backend, store) = discovery();
        let line = format!("session_id={SID}");

        backend.set_available(false);
        d.observe(&line).await;
        assert_eq!(d.stats().errors_swallowed, 1);

        // The id was not marked processed, so a later line succeeds.
        backend.set_available(true);
        d.observe(&line).await;
        assert!(store.get(SID).await.unwrap().is_some());
        assert_eq!(d.stats().sessions_recorded, 1);
    }

    #[test]
    fn seen_set_evicts_fifo() {
        let mut seen = SeenSet::new(2);
        seen.insert("a".into());
        seen.insert("b".into());
        seen.insert("c".into());
        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
    }
}
