//! In-memory session store — useful for testing and single-process deployments.

use async_trait::async_trait;
use shopchat_core::error::SessionError;
use shopchat_core::session::{SessionId, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Expired entries are swept once every this many writes.
const SWEEP_INTERVAL: usize = 128;

struct StoredValue {
    value: serde_json::Value,
    written_at: Instant,
}

/// A session store that keeps values in a `HashMap`.
///
/// With a TTL configured, values older than the TTL read as absent. They are
/// evicted on access and by a periodic sweep during writes, so abandoned
/// sessions do not accumulate.
pub struct InMemorySessionStore {
    entries: Arc<RwLock<HashMap<(String, String), StoredValue>>>,
    ttl: Option<Duration>,
    writes: AtomicUsize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: None,
            writes: AtomicUsize::new(0),
        }
    }

    /// Expire values `ttl` after their last write.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn is_expired(&self, stored: &StoredValue) -> bool {
        expired(self.ttl, stored)
    }

    /// Drop every expired entry, returning how many were removed.
    fn sweep(&self, entries: &mut HashMap<(String, String), StoredValue>) -> usize {
        let ttl = self.ttl;
        let before = entries.len();
        entries.retain(|_, stored| !expired(ttl, stored));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Swept expired session values");
        }
        removed
    }

    #[cfg(test)]
    async fn raw_len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let entries = self.entries.read().await;
        let mut sessions: Vec<&str> = entries
            .iter()
            .filter(|(_, v)| !self.is_expired(v))
            .map(|((s, _), _)| s.as_str())
            .collect();
        sessions.sort_unstable();
        sessions.dedup();
        sessions.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn expired(ttl: Option<Duration>, stored: &StoredValue) -> bool {
    ttl.is_some_and(|ttl| stored.written_at.elapsed() >= ttl)
}

fn entry_key(session: &SessionId, key: &str) -> (String, String) {
    (session.as_str().to_string(), key.to_string())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let k = entry_key(session, key);
        {
            let entries = self.entries.read().await;
            match entries.get(&k) {
                None => return Ok(None),
                Some(stored) if !self.is_expired(stored) => return Ok(Some(stored.value.clone())),
                Some(_) => {}
            }
        }

        debug!(session = %session, key, "Session value expired");
        self.entries.write().await.remove(&k);
        Ok(None)
    }

    async fn set(
        &self,
        session: &SessionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if self.ttl.is_some() && writes % SWEEP_INTERVAL == 0 {
            self.sweep(&mut entries);
        }
        entries.insert(
            entry_key(session, key),
            StoredValue {
                value,
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, session: &SessionId, key: &str) -> Result<bool, SessionError> {
        Ok(self
            .entries
            .write()
            .await
            .remove(&entry_key(session, key))
            .is_some())
    }
}
