//! Metrics stores — durable homes for the single [`AggregateMetrics`] record.
//!
//! Every store reads the record fresh on each call, so counters survive
//! restarts and stay consistent across processes sharing the same backing
//! file or database. Missing fields are filled from defaults and written back;
//! unreadable records are archived and replaced with a fresh default.

use crate::TelemetryError;
use crate::model::{AggregateMetrics, Decoded};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// A mutation applied to the stored record inside one read-modify-write.
pub type MetricsMutation = Box<dyn FnOnce(&mut AggregateMetrics) + Send>;

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "memory").
    fn name(&self) -> &str;

    /// Read the current record, creating a default one if none exists.
    async fn load(&self) -> Result<AggregateMetrics, TelemetryError>;

    /// Apply `mutation` to the current record and save it in full.
    /// Returns the saved record.
    async fn update(&self, mutation: MetricsMutation) -> Result<AggregateMetrics, TelemetryError>;
}

// ── JSON file ─────────────────────────────────────────────────────────────

/// Stores the record as one pretty-printed JSON document.
///
/// Read-modify-write cycles within this process are serialised by a mutex.
/// Separate processes sharing the file can still lose updates.
pub struct JsonFileMetricsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileMetricsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, migrating or recovering as needed. Caller holds the lock.
    async fn read_or_init(&self) -> Result<AggregateMetrics, TelemetryError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let metrics = AggregateMetrics::default();
                let metrics = self.save(metrics).await?;
                info!(path = %self.path.display(), "Created default metrics file");
                return Ok(metrics);
            }
            Err(e) => {
                return Err(TelemetryError::Storage(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        match AggregateMetrics::decode(&raw) {
            Decoded::Valid { metrics, added } if added.is_empty() => Ok(metrics),
            Decoded::Valid { metrics, added } => {
                for field in &added {
                    info!(field = %field, "Added missing field to metrics");
                }
                self.save(metrics).await
            }
            Decoded::Corrupt(reason) => {
                error!(path = %self.path.display(), error = %reason, "Metrics file corrupted");
                self.archive().await;
                let metrics = self.save(AggregateMetrics::default()).await?;
                info!("Created new metrics file after corruption recovery");
                Ok(metrics)
            }
        }
    }

    /// Move the unreadable file aside as `<path>.corrupted.<YYYYmmdd_HHMMSS>`.
    async fn archive(&self) {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut backup = self.path.clone().into_os_string();
        backup.push(format!(".corrupted.{stamp}"));
        let backup = PathBuf::from(backup);

        match tokio::fs::rename(&self.path, &backup).await {
            Ok(()) => warn!(backup = %backup.display(), "Corrupted metrics file backed up"),
            Err(e) => error!(error = %e, "Failed to back up corrupted metrics file"),
        }
    }

    async fn save(&self, mut metrics: AggregateMetrics) -> Result<AggregateMetrics, TelemetryError> {
        metrics.last_updated = Some(Utc::now());
        let content = serde_json::to_string_pretty(&metrics)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TelemetryError::Storage(format!("Failed to create metrics directory: {e}"))
            })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| TelemetryError::Storage(format!("Failed to write metrics: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| TelemetryError::Storage(format!("Failed to replace metrics file: {e}")))?;
        Ok(metrics)
    }
}

#[async_trait]
impl MetricsStore for JsonFileMetricsStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Result<AggregateMetrics, TelemetryError> {
        let _guard = self.lock.lock().await;
        self.read_or_init().await
    }

    async fn update(&self, mutation: MetricsMutation) -> Result<AggregateMetrics, TelemetryError> {
        let _guard = self.lock.lock().await;
        let mut metrics = self.read_or_init().await?;
        mutation(&mut metrics);
        self.save(metrics).await
    }
}

// ── SQLite ────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMetricsStore;

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use sqlx::{Row, SqliteConnection, SqlitePool};
    use std::str::FromStr;
    use std::time::Duration;

    /// How long a writer waits for the database write lock.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Stores the record as a single JSON row.
    ///
    /// Each update runs inside one `BEGIN IMMEDIATE` transaction. Writers in
    /// this or other processes queue on the write lock, so no increment is lost.
    pub struct SqliteMetricsStore {
        pool: SqlitePool,
    }

    fn db_err(context: &str) -> impl FnOnce(sqlx::Error) -> TelemetryError + '_ {
        move |e| TelemetryError::Storage(format!("{context}: {e}"))
    }

    impl SqliteMetricsStore {
        /// Open (or create) the database at `path`.
        ///
        /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
        pub async fn new(path: &str) -> Result<Self, TelemetryError> {
            let options = SqliteConnectOptions::from_str(path)
                .map_err(db_err("Invalid SQLite path"))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(BUSY_TIMEOUT);

            let pool = SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await
                .map_err(db_err("Failed to open SQLite"))?;

            let store = Self { pool };
            store.run_migrations().await?;
            info!("SQLite metrics store initialized at {path}");
            Ok(store)
        }

        async fn run_migrations(&self) -> Result<(), TelemetryError> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS metrics (
                    id    INTEGER PRIMARY KEY CHECK (id = 1),
                    data  TEXT NOT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await
            .map_err(db_err("metrics table"))?;

            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS metrics_archive (
                    archived_at  TEXT NOT NULL,
                    reason       TEXT NOT NULL,
                    data         TEXT NOT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await
            .map_err(db_err("metrics_archive table"))?;
            Ok(())
        }

        /// Run one read-modify-write under the database write lock.
        ///
        /// With no mutation the record is only rewritten when it had to be
        /// created, migrated, or reset.
        async fn transact(
            &self,
            mutation: Option<MetricsMutation>,
        ) -> Result<AggregateMetrics, TelemetryError> {
            let mut conn = self.pool.acquire().await.map_err(db_err("acquire"))?;
            // A deferred transaction cannot upgrade its read lock while another
            // connection writes, so take the write lock before the first read.
            sqlx::query("BEGIN IMMEDIATE")
                .execute(&mut *conn)
                .await
                .map_err(db_err("begin"))?;

            match Self::apply(&mut conn, mutation).await {
                Ok(metrics) => match sqlx::query("COMMIT").execute(&mut *conn).await {
                    Ok(_) => Ok(metrics),
                    Err(e) => {
                        Self::rollback(&mut conn).await;
                        Err(db_err("commit")(e))
                    }
                },
                Err(e) => {
                    Self::rollback(&mut conn).await;
                    Err(e)
                }
            }
        }

        async fn apply(
            conn: &mut SqliteConnection,
            mutation: Option<MetricsMutation>,
        ) -> Result<AggregateMetrics, TelemetryError> {
            let (mut metrics, dirty) = Self::read_in(conn).await?;
            match mutation {
                Some(mutation) => {
                    mutation(&mut metrics);
                    Self::write_in(conn, metrics).await
                }
                None if dirty => Self::write_in(conn, metrics).await,
                None => Ok(metrics),
            }
        }

        async fn rollback(conn: &mut SqliteConnection) {
            if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %e, "Failed to roll back metrics transaction");
            }
        }

        /// Read the record. Returns it plus whether it must be rewritten.
        async fn read_in(
            conn: &mut SqliteConnection,
        ) -> Result<(AggregateMetrics, bool), TelemetryError> {
            let row = sqlx::query("SELECT data FROM metrics WHERE id = 1")
                .fetch_optional(&mut *conn)
                .await
                .map_err(db_err("read metrics"))?;

            let Some(row) = row else {
                info!("Created default metrics record");
                return Ok((AggregateMetrics::default(), true));
            };
            let raw: String = row.try_get("data").map_err(db_err("data column"))?;

            match AggregateMetrics::decode(&raw) {
                Decoded::Valid { metrics, added } => {
                    for field in &added {
                        info!(field = %field, "Added missing field to metrics");
                    }
                    Ok((metrics, !added.is_empty()))
                }
                Decoded::Corrupt(reason) => {
                    error!(error = %reason, "Metrics record corrupted, archiving");
                    sqlx::query(
                        "INSERT INTO metrics_archive (archived_at, reason, data) VALUES (?, ?, ?)",
                    )
                    .bind(Utc::now().to_rfc3339())
                    .bind(&reason)
                    .bind(&raw)
                    .execute(&mut *conn)
                    .await
                    .map_err(db_err("archive metrics"))?;
                    Ok((AggregateMetrics::default(), true))
                }
            }
        }

        async fn write_in(
            conn: &mut SqliteConnection,
            mut metrics: AggregateMetrics,
        ) -> Result<AggregateMetrics, TelemetryError> {
            metrics.last_updated = Some(Utc::now());
            let raw = serde_json::to_string(&metrics)?;
            sqlx::query(
                "INSERT INTO metrics (id, data) VALUES (1, ?) \
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            )
            .bind(raw)
            .execute(&mut *conn)
            .await
            .map_err(db_err("write metrics"))?;
            Ok(metrics)
        }

        #[cfg(test)]
        pub(crate) async fn archived_count(&self) -> i64 {
            sqlx::query("SELECT COUNT(*) AS n FROM metrics_archive")
                .fetch_one(&self.pool)
                .await
                .and_then(|row| row.try_get("n"))
                .unwrap()
        }

        #[cfg(test)]
        pub(crate) async fn overwrite_raw(&self, raw: &str) -> Result<(), TelemetryError> {
            sqlx::query(
                "INSERT INTO metrics (id, data) VALUES (1, ?) \
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            )
            .bind(raw)
            .execute(&self.pool)
            .await
            .map_err(db_err("overwrite metrics"))?;
            Ok(())
        }
    }

    #[async_trait]
    impl MetricsStore for SqliteMetricsStore {
        fn name(&self) -> &str {
            "sqlite"
        }

        async fn load(&self) -> Result<AggregateMetrics, TelemetryError> {
            self.transact(None).await
        }

        async fn update(
            &self,
            mutation: MetricsMutation,
        ) -> Result<AggregateMetrics, TelemetryError> {
            self.transact(Some(mutation)).await
        }
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────

/// Keeps the record in process memory. Useful for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryMetricsStore {
    metrics: Mutex<AggregateMetrics>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<AggregateMetrics, TelemetryError> {
        Ok(self.metrics.lock().await.clone())
    }

    async fn update(&self, mutation: MetricsMutation) -> Result<AggregateMetrics, TelemetryError> {
        let mut metrics = self.metrics.lock().await;
        mutation(&mut metrics);
        metrics.last_updated = Some(Utc::now());
        Ok(metrics.clone())
    }
}
