//! Process-local transport objects bound into the registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ar_domain::error::Result;
use ar_sessions::{SessionTransport, TransportFactory};

/// Handle for a streamable-HTTP client connection.
///
/// The gateway does not hold sockets itself; liveness is a flag flipped
/// when the peer disconnects or the handle is administratively closed.
pub struct StreamableHttpTransport {
    session_id: String,
    created_at: DateTime<Utc>,
    alive: AtomicBool,
}

impl StreamableHttpTransport {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            alive: AtomicBool::new(true),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn close(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

impl SessionTransport for StreamableHttpTransport {
    fn kind(&self) -> &str {
        "streamable_http"
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

/// Constructs [`StreamableHttpTransport`] handles for recovery stages.
pub struct HttpTransportFactory;

#[async_trait]
impl TransportFactory for HttpTransportFactory {
    async fn construct(
        &self,
        session_id: &str,
        _server_name: &str,
    ) -> Result<Arc<dyn SessionTransport>> {
        Ok(Arc::new(StreamableHttpTransport::new(session_id)))
    }
}
