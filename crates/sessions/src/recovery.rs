//! Staged recovery for sessions whose local transport handle is missing
//! (typically after a process restart).
//!
//! The orchestrator is a strictly forward-progressing state machine:
//! existence check, reattach to an existing application session, full
//! rebuild. Each stage runs at most once per admission; retries across
//! calls are bounded by the per-session attempt budget and cooldown.
//! The budget is process-local by design — a caller bounced between N
//! processes gets N times the nominal budget.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use ar_domain::config::RecoveryConfig;
use ar_domain::error::{Error, Result};
use ar_domain::trace::TraceEvent;

use crate::identity::UserType;
use crate::registry::{SessionTransport, TransportRegistry, TransportResolution};
use crate::store::SessionStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Attempt tracking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Attempt {
    count: u32,
    last_attempt: DateTime<Utc>,
}

/// Admission decision for a recovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { attempt: u32 },
    Exhausted { attempts: u32 },
}

/// Process-local recovery budget per session id.
pub struct AttemptTracker {
    attempts: Mutex<HashMap<String, Attempt>>,
    max_attempts: u32,
    cooldown: chrono::Duration,
}

impl AttemptTracker {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts: config.max_attempts,
            cooldown: chrono::Duration::seconds(config.cooldown_secs as i64),
        }
    }

    /// Gate and record an attempt in one step, so a crash mid-recovery
    /// still counts against the budget.
    pub fn admit(&self, session_id: &str) -> Admission {
        self.admit_at(session_id, Utc::now())
    }

    /// Admission at an explicit instant. Rejections do not stamp the
    /// entry — otherwise the cooldown could never elapse under load.
    pub fn admit_at(&self, session_id: &str, now: DateTime<Utc>) -> Admission {
        let mut attempts = self.attempts.lock();
        let entry = attempts.entry(session_id.to_owned()).or_insert(Attempt {
            count: 0,
            last_attempt: now,
        });
        if now.signed_duration_since(entry.last_attempt) >= self.cooldown {
            entry.count = 0;
        } else if entry.count >= self.max_attempts {
            return Admission::Exhausted {
                attempts: entry.count,
            };
        }
        entry.count += 1;
        entry.last_attempt = now;
        Admission::Admitted {
            attempt: entry.count,
        }
    }

    /// Drop counters idle for two cooldown windows.
    pub fn gc(&self) {
        self.gc_at(Utc::now());
    }

    pub fn gc_at(&self, now: DateTime<Utc>) {
        let cutoff = self.cooldown * 2;
        self.attempts
            .lock()
            .retain(|_, a| now.signed_duration_since(a.last_attempt) < cutoff);
    }

    pub fn stats(&self) -> RecoveryStats {
        RecoveryStats {
            sessions_tracked: self.attempts.lock().len(),
            max_attempts: self.max_attempts,
            cooldown_secs: self.cooldown.num_seconds() as u64,
        }
    }
}

/// Tracker counters for the diagnostics surface.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryStats {
    pub sessions_tracked: usize,
    pub max_attempts: u32,
    pub cooldown_secs: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Constructs fresh transports during recovery stages 2 and 3.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn construct(
        &self,
        session_id: &str,
        server_name: &str,
    ) -> Result<Arc<dyn SessionTransport>>;
}

/// Which stage produced the recovered transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    /// The registry already held a live handle (races only).
    LocalHit,
    /// A fresh transport was bound to an existing application session.
    Reattached,
    /// Application session and transport were both rebuilt.
    Rebuilt,
}

impl RecoveryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStage::LocalHit => "local_hit",
            RecoveryStage::Reattached => "reattached",
            RecoveryStage::Rebuilt => "rebuilt",
        }
    }
}

pub struct Recovered {
    pub transport: Arc<dyn SessionTransport>,
    pub stage: RecoveryStage,
}

impl std::fmt::Debug for Recovered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recovered")
            .field("stage", &self.stage)
            .field("transport_kind", &self.transport.kind())
            .finish()
    }
}

pub struct RecoveryOrchestrator {
    store: Arc<SessionStore>,
    registry: Arc<TransportRegistry>,
    tracker: Arc<AttemptTracker>,
    factory: Arc<dyn TransportFactory>,
    server_name: String,
}

impl RecoveryOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<TransportRegistry>,
        tracker: Arc<AttemptTracker>,
        factory: Arc<dyn TransportFactory>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            tracker,
            factory,
            server_name: server_name.into(),
        }
    }

    pub fn tracker(&self) -> &Arc<AttemptTracker> {
        &self.tracker
    }

    /// Attempt to recover a usable transport for `session_id`.
    ///
    /// The attempt is recorded before any work. Failures are reported to
    /// the caller and never retried internally; the admission gate bounds
    /// retries across calls.
    pub async fn recover(&self, session_id: &str) -> Result<Recovered> {
        match self.tracker.admit(session_id) {
            Admission::Exhausted { attempts } => {
                TraceEvent::RecoveryFailed {
                    session_id: session_id.to_owned(),
                    reason: "attempt budget exhausted".into(),
                }
                .emit();
                return Err(Error::RecoveryExhausted {
                    session_id: session_id.to_owned(),
                    attempts,
                });
            }
            Admission::Admitted { attempt } => {
                TraceEvent::RecoveryAdmitted {
                    session_id: session_id.to_owned(),
                    attempt,
                }
                .emit();
            }
        }

        match self.run_stages(session_id).await {
            Ok(recovered) => {
                TraceEvent::RecoveryCompleted {
                    session_id: session_id.to_owned(),
                    stage: recovered.stage.as_str().to_owned(),
                }
                .emit();
                Ok(recovered)
            }
            Err(e) => {
                TraceEvent::RecoveryFailed {
                    session_id: session_id.to_owned(),
                    reason: e.to_string(),
                }
                .emit();
                Err(e)
            }
        }
    }

    async fn run_stages(&self, session_id: &str) -> Result<Recovered> {
        // Stage 1: existence check. A local hit should not happen given
        // the caller only enters recovery on a miss, but guards races.
        if let TransportResolution::Live(transport) =
            self.registry.resolve(session_id).await?
        {
            return Ok(Recovered {
                transport,
                stage: RecoveryStage::LocalHit,
            });
        }

        // Stage 2: reattach a fresh transport to an existing app session.
        if self.store.get(session_id).await?.is_some() {
            let transport = self.construct_and_bind(session_id).await?;
            return Ok(Recovered {
                transport,
                stage: RecoveryStage::Reattached,
            });
        }

        // Stage 3: full rebuild. The recreated session has no known owner
        // yet; the directory adopts it on the next authenticated touch.
        let client_id = format!(
            "recovered_client_{}",
            session_id.chars().take(8).collect::<String>()
        );
        let mut payload = serde_json::Map::new();
        payload.insert("recovered".into(), serde_json::Value::Bool(true));
        payload.insert(
            "recovery_time".into(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        self.store
            .create(session_id, &client_id, "", UserType::Anonymous, payload)
            .await?;
        let transport = self.construct_and_bind(session_id).await?;
        Ok(Recovered {
            transport,
            stage: RecoveryStage::Rebuilt,
        })
    }

    async fn construct_and_bind(&self, session_id: &str) -> Result<Arc<dyn SessionTransport>> {
        let transport = self
            .factory
            .construct(session_id, &self.server_name)
            .await
            .map_err(|e| Error::TransportConstruction(e.to_string()))?;
        self.registry
            .bind(session_id, Some(transport.clone()), &self.server_name)
            .await?;
        Ok(transport)
    }
}
