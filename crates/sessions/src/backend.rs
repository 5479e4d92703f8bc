//! Shared key-value backend boundary.
//!
//! All durable session state lives behind [`KvBackend`]: string keys,
//! string values (JSON-encoded records), per-key TTLs, and set-type
//! values for the per-identity indexes. The backend is the only
//! synchronization point in the subsystem — it guarantees per-key
//! atomicity and nothing across keys.
//!
//! [`MemoryBackend`] is the in-process implementation. It doubles as the
//! test backend: it carries a controllable clock and an availability
//! toggle so TTL expiry and outage handling can be exercised directly.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use ar_domain::error::{Error, Result};

/// Key-value operations the session subsystem requires of its backend.
///
/// `keys` is pattern enumeration over a prefix — acceptable only because
/// session volume is low; a production-scale backend would substitute a
/// scan cursor or secondary index.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Round-trip liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Set `key` to `value` with a TTL (atomic SETEX).
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Get the string value at `key`, or `None` if absent/expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete `key`. Returns whether a live entry was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Reset the TTL of an existing key. Returns `false` when absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Add `member` to the set at `key`, creating the set if needed.
    async fn sadd(&self, key: &str, member: &str) -> Result<()>;

    /// Remove `member` from the set at `key`.
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of the set at `key` (empty when absent/expired).
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// All live keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Entry<T> {
    value: T,
    expires_at: Option<Instant>,
}

impl<T> Entry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, Entry<String>>,
    sets: HashMap<String, Entry<HashSet<String>>>,
}

/// Process-local [`KvBackend`] with lazy TTL expiry.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    /// Virtual-clock offset added to `Instant::now()`; advanced by tests
    /// to simulate elapsed time without sleeping.
    clock_offset: Mutex<Duration>,
    available: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock_offset: Mutex::new(Duration::ZERO),
            available: AtomicBool::new(true),
        }
    }

    /// Advance the backend's virtual clock.
    pub fn advance(&self, by: Duration) {
        *self.clock_offset.lock() += by;
    }

    /// Simulate an outage (`false`) or restore service (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn now(&self) -> Instant {
        Instant::now() + *self.clock_offset.lock()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::BackendUnavailable("backend marked unavailable".into()))
        }
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        let now = self.now();
        let mut inner = self.inner.lock();
        inner.strings.insert(
            key.to_owned(),
            Entry { value: value.to_owned(), expires_at: Some(now + ttl) },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let now = self.now();
        let mut inner = self.inner.lock();
        match inner.strings.get(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                inner.strings.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        let now = self.now();
        let mut inner = self.inner.lock();
        let had_string = inner
            .strings
            .remove(key)
            .is_some_and(|e| !e.is_expired(now));
        let had_set = inner.sets.remove(key).is_some_and(|e| !e.is_expired(now));
        Ok(had_string || had_set)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.check_available()?;
        let now = self.now();
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.strings.get_mut(key) {
            if !entry.is_expired(now) {
                entry.expires_at = Some(now + ttl);
                return Ok(true);
            }
        }
        if let Some(entry) = inner.sets.get_mut(key) {
            if !entry.is_expired(now) {
                entry.expires_at = Some(now + ttl);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.check_available()?;
        let now = self.now();
        let mut inner = self.inner.lock();
        let entry = inner.sets.entry(key.to_owned()).or_insert_with(|| Entry {
            value: HashSet::new(),
            expires_at: None,
        });
        if entry.is_expired(now) {
            entry.value.clear();
            entry.expires_at = None;
        }
        entry.value.insert(member.to_owned());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        self.check_available()?;
        let now = self.now();
        let mut inner = self.inner.lock();
        match inner.sets.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => Ok(entry.value.remove(member)),
            _ => Ok(false),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let now = self.now();
        let inner = self.inner.lock();
        match inner.sets.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                Ok(entry.value.iter().cloned().collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let now = self.now();
        let inner = self.inner.lock();
        let mut out: Vec<String> = inner
            .strings
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        out.extend(
            inner
                .sets
                .iter()
                .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
                .map(|(k, _)| k.clone()),
        );
        Ok(out)
    }
}
