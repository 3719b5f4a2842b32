//! Operational metrics for shopchat.
//!
//! Tracks requests, tokens, latency, estimated cost, and empty retrievals
//! across turns. Aggregates live in a durable [`MetricsStore`] and are only
//! mutated through the [`MetricsRecorder`].

pub mod model;
pub mod pricing;
pub mod recorder;
pub mod store;
pub mod token;

pub use model::{AggregateMetrics, ContextText, EmptyRetrievalEntry, MetricsSummary, TurnMetrics};
pub use pricing::{ModelPricing, PricingTable};
pub use recorder::{MetricsRecorder, preview};
pub use store::{InMemoryMetricsStore, JsonFileMetricsStore, MetricsMutation, MetricsStore};
pub use token::estimate_tokens;

#[cfg(feature = "sqlite")]
pub use store::SqliteMetricsStore;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("metrics storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
