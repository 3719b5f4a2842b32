//! Metrics recorder — the only writer of aggregate metrics.
//!
//! Each call is one read-modify-write against the [`MetricsStore`]; nothing
//! is cached in process, so `summary()` always reflects the stored record.

use crate::TelemetryError;
use crate::model::{AggregateMetrics, EmptyRetrievalEntry, MetricsSummary, TurnMetrics};
use crate::pricing::{ModelPricing, PricingTable};
use crate::store::MetricsStore;
use crate::token::estimate_tokens;
use chrono::Utc;
use shopchat_config::TelemetryConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MetricsRecorder {
    store: Arc<dyn MetricsStore>,
    pricing: Option<ModelPricing>,
    empty_retrieval_capacity: usize,
}

impl MetricsRecorder {
    pub fn new(
        store: Arc<dyn MetricsStore>,
        pricing: Option<ModelPricing>,
        empty_retrieval_capacity: usize,
    ) -> Self {
        Self {
            store,
            pricing,
            empty_retrieval_capacity: empty_retrieval_capacity.max(1),
        }
    }

    /// Build a recorder for `model`, resolving its price from the config
    /// override or the built-in table.
    pub fn from_config(store: Arc<dyn MetricsStore>, config: &TelemetryConfig, model: &str) -> Self {
        let pricing = match config.pricing {
            Some(custom) => Some(ModelPricing::from(custom)),
            None => PricingTable::with_defaults().lookup(model),
        };
        match pricing {
            Some(p) => info!(
                model,
                input_per_m = p.input_per_m,
                output_per_m = p.output_per_m,
                "Model pricing resolved"
            ),
            None => warn!(model, "No pricing known for model, costs will be recorded as 0"),
        }
        Self::new(store, pricing, config.empty_retrieval_log_capacity)
    }

    pub fn store(&self) -> &Arc<dyn MetricsStore> {
        &self.store
    }

    pub fn pricing(&self) -> Option<ModelPricing> {
        self.pricing
    }

    /// Fold one turn into the aggregates.
    pub async fn record(&self, turn: TurnMetrics) -> Result<AggregateMetrics, TelemetryError> {
        let (cost, context_tokens) = if turn.success {
            let cost = self
                .pricing
                .map(|p| p.blended_cost(turn.total_tokens))
                .unwrap_or(0.0);
            let context_tokens = turn.context.as_ref().map_or(0, |ctx| {
                let static_tokens = estimate_tokens(&ctx.static_instructions);
                let rag_tokens = ctx.retrieved.as_deref().map_or(0, estimate_tokens);
                debug!(static_tokens, rag_tokens, "Context size");
                static_tokens + rag_tokens
            });
            (cost, context_tokens)
        } else {
            (0.0, 0)
        };

        self.store
            .update(Box::new(move |m: &mut AggregateMetrics| {
                m.apply_turn(&turn, cost, context_tokens)
            }))
            .await
    }

    /// Log an utterance whose retrieval came back empty.
    pub async fn record_empty_retrieval(&self, utterance: &str) -> Result<(), TelemetryError> {
        let entry = EmptyRetrievalEntry {
            query: utterance.to_string(),
            timestamp: Utc::now(),
        };
        let capacity = self.empty_retrieval_capacity;
        self.store
            .update(Box::new(move |m: &mut AggregateMetrics| {
                m.push_empty_retrieval(entry, capacity)
            }))
            .await?;
        info!(query = %preview(utterance, 50), "Tracked empty retrieval");
        Ok(())
    }

    /// Rates and averages, read fresh from the store.
    pub async fn summary(&self) -> Result<MetricsSummary, TelemetryError> {
        Ok(self.store.load().await?.summary())
    }
}

/// First `max` characters of `text`, with `...` when cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
