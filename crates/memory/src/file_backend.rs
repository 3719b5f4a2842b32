//! File-based session store — one JSON document per session.
//!
//! Each session lives in `<dir>/<session_id>.json` as an object mapping keys
//! to values. Session ids are sanitised to `[A-Za-z0-9_-]` before they touch
//! the filesystem. Human-inspectable and needs no database.

use async_trait::async_trait;
use shopchat_core::error::SessionError;
use shopchat_core::session::{SessionId, SessionStore};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Document = serde_json::Map<String, serde_json::Value>;

/// A file-backed session store.
///
/// Writes are serialised by an async mutex, so concurrent turns within one
/// process never interleave a read-modify-write of the same document.
pub struct FileSessionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File session store ready");
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, session: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(session.as_str())))
    }

    async fn read_document(&self, path: &Path) -> Result<Document, SessionError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Unreadable session document");
            SessionError::Corrupt(format!("{}: {e}", path.display()))
        })
    }

    async fn write_document(&self, path: &Path, doc: &Document) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SessionError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize session: {e}")))?;

        // Write to a sibling temp file, then rename, so readers never see a torn document.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to replace session file: {e}")))
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
fn sanitize(session_id: &str) -> String {
    let cleaned: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".into()
    } else {
        cleaned
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<serde_json::Value>, SessionError> {
        let doc = self.read_document(&self.document_path(session)).await?;
        Ok(doc.get(key).cloned())
    }

    async fn set(
        &self,
        session: &SessionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        let path = self.document_path(session);
        let mut doc = self.read_document(&path).await?;
        doc.insert(key.to_string(), value);
        self.write_document(&path, &doc).await
    }

    async fn delete(&self, session: &SessionId, key: &str) -> Result<bool, SessionError> {
        let _guard = self.write_lock.lock().await;
        let path = self.document_path(session);
        let mut doc = self.read_document(&path).await?;
        if doc.remove(key).is_none() {
            return Ok(false);
        }

        if doc.is_empty() {
            tokio::fs::remove_file(&path).await.map_err(|e| {
                SessionError::Storage(format!("Failed to remove session file: {e}"))
            })?;
        } else {
            self.write_document(&path, &doc).await?;
        }
        Ok(true)
    }
}
