//! Session identity and the session store contract.
//!
//! The orchestration layer never holds conversation state between turns.
//! It brackets each turn with a `get` and a `set` against a [`SessionStore`]
//! keyed by [`SessionId`].

use crate::error::SessionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-identified continuity boundary under which one conversation is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key/value persistence scoped by session.
///
/// Implementations: in-memory (with TTL), JSON files, SQLite.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "sqlite").
    fn name(&self) -> &str;

    /// Read a value; `None` when absent or expired.
    async fn get(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<serde_json::Value>, SessionError>;

    /// Write (or overwrite) a value.
    async fn set(
        &self,
        session: &SessionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SessionError>;

    /// Remove a value. Returns whether anything was removed.
    async fn delete(&self, session: &SessionId, key: &str) -> Result<bool, SessionError>;

    /// Write/read/delete round-trip used by startup validation.
    async fn health_check(&self) -> Result<(), SessionError> {
        let check = SessionId::from("__health_check__");
        self.set(&check, "check", serde_json::json!("ok")).await?;
        let read = self.get(&check, "check").await?;
        self.delete(&check, "check").await?;
        if read == Some(serde_json::json!("ok")) {
            Ok(())
        } else {
            Err(SessionError::Storage(format!(
                "{} read/write round trip returned {:?}",
                self.name(),
                read
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn session_id_serialises_as_string() {
        let id = SessionId::from("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
        assert_eq!(id.to_string(), "abc-123");
    }

    #[test]
    fn session_id_converts_from_borrowed_and_owned_strings() {
        let borrowed: SessionId = "user-7".into();
        let owned = SessionId::from(String::from("user-7"));
        assert_eq!(borrowed, owned);
        assert_eq!(owned.as_str(), "user-7");
    }
}
