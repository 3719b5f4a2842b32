//! SQLite session store.
//!
//! One table, `sessions(session_id, key, value, updated_at)`, keyed by
//! `(session_id, key)`. Values are stored as JSON text; `set` upserts.
//! With a TTL configured, rows older than the TTL read as absent. They are
//! deleted on access and purged in bulk once every [`PURGE_INTERVAL`] writes.

use async_trait::async_trait;
use chrono::Utc;
use shopchat_core::error::SessionError;
use shopchat_core::session::{SessionId, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Expired rows are purged once every this many writes.
pub const PURGE_INTERVAL: usize = 128;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// A SQLite-backed session store.
pub struct SqliteSessionStore {
    pool: SqlitePool,
    ttl: Option<Duration>,
    writes: AtomicUsize,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, SessionError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SessionError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SessionError> {
        let store = Self {
            pool,
            ttl: None,
            writes: AtomicUsize::new(0),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Expire rows `ttl` after their last write.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    async fn run_migrations(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id  TEXT NOT NULL,
                key         TEXT NOT NULL,
                value       TEXT NOT NULL,
                updated_at  INTEGER NOT NULL,
                PRIMARY KEY (session_id, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("sessions table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("updated_at index: {e}")))?;

        debug!("SQLite session migrations complete");
        Ok(())
    }

    fn is_expired(&self, updated_at: i64) -> bool {
        self.ttl.is_some_and(|ttl| {
            let age = Utc::now().timestamp().saturating_sub(updated_at);
            age >= 0 && age as u64 >= ttl.as_secs()
        })
    }

    /// Delete every expired row. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        let Some(ttl) = self.ttl else {
            return Ok(0);
        };
        let cutoff = Utc::now().timestamp() - ttl.as_secs() as i64;
        let result = sqlx::query("DELETE FROM sessions WHERE updated_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("purge failed: {e}")))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let row = sqlx::query("SELECT value, updated_at FROM sessions WHERE session_id = ? AND key = ?")
            .bind(session.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("get failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let updated_at: i64 = row
            .try_get("updated_at")
            .map_err(|e| SessionError::Storage(format!("updated_at column: {e}")))?;
        if self.is_expired(updated_at) {
            debug!(session = %session, key, "Session row expired");
            self.delete(session, key).await?;
            return Ok(None);
        }

        let raw: String = row
            .try_get("value")
            .map_err(|e| SessionError::Storage(format!("value column: {e}")))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SessionError::Corrupt(format!("session {session}: {e}")))
    }

    async fn set(
        &self,
        session: &SessionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SessionError> {
        let raw = serde_json::to_string(&value)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize session: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session.as_str())
        .bind(key)
        .bind(raw)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("set failed: {e}")))?;

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % PURGE_INTERVAL == 0 {
            match self.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "Purged expired session rows"),
                Err(e) => warn!(error = %e, "Session purge failed"),
            }
        }

        Ok(())
    }

    async fn delete(&self, session: &SessionId, key: &str) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ? AND key = ?")
            .bind(session.as_str())
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("delete failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> SqliteSessionStore {
        SqliteSessionStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = test_store().await;
        let session = SessionId::from("s1");
        store
            .set(&session, "messages", json!([{"role": "system", "content": "rules"}]))
            .await
            .unwrap();
        let value = store.get(&session, "messages").await.unwrap().unwrap();
        assert_eq!(value[0]["role"], "system");
    }

    #[tokio::test]
    async fn set_overwrites() {
        let store = test_store().await;
        let session = SessionId::from("s1");
        store.set(&session, "messages", json!([1])).await.unwrap();
        store.set(&session, "messages", json!([1, 2])).await.unwrap();
        assert_eq!(
            store.get(&session, "messages").await.unwrap(),
            Some(json!([1, 2]))
        );
    }

    #[tokio::test]
    async fn absent_key_is_none() {
        let store = test_store().await;
        assert!(store
            .get(&SessionId::from("nobody"), "messages")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_nonexistent() {
        let store = test_store().await;
        assert!(!store.delete(&SessionId::from("x"), "messages").await.unwrap());
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let store = test_store().await.with_ttl(Duration::ZERO);
        let session = SessionId::from("s1");
        store.set(&session, "messages", json!([])).await.unwrap();
        assert!(store.get(&session, "messages").await.unwrap().is_none());
        assert!(!store.delete(&session, "messages").await.unwrap());
    }

    #[tokio::test]
    async fn purge_without_ttl_is_noop() {
        let store = test_store().await;
        store.set(&SessionId::from("s"), "k", json!(1)).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    async fn row_count(store: &SqliteSessionStore) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM sessions")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n")
    }

    #[tokio::test]
    async fn abandoned_rows_are_purged_during_writes() {
        let store = test_store().await.with_ttl(Duration::ZERO);
        for i in 0..PURGE_INTERVAL {
            let session = SessionId::from(format!("abandoned-{i}"));
            store.set(&session, "messages", json!([])).await.unwrap();
        }
        assert_eq!(row_count(&store).await, 0);
    }

    #[tokio::test]
    async fn rows_without_ttl_are_never_purged() {
        let store = test_store().await;
        for i in 0..PURGE_INTERVAL {
            let session = SessionId::from(format!("s{i}"));
            store.set(&session, "messages", json!([])).await.unwrap();
        }
        assert_eq!(row_count(&store).await, PURGE_INTERVAL as i64);
    }

    #[tokio::test]
    async fn health_check_round_trips() {
        test_store().await.health_check().await.unwrap();
    }
}
