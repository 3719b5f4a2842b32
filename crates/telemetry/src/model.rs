//! Data model for aggregate metrics, per-turn outcomes, and summary reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Per-turn outcome ──────────────────────────────────────────────────────

/// The text a successful turn sent as context, for context-size accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextText {
    /// The static instructions, concatenated in seeding order.
    pub static_instructions: String,
    /// The retrieved knowledge injected for this turn, if any.
    pub retrieved: Option<String>,
}

/// Outcome record for one turn. Folded into [`AggregateMetrics`] immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnMetrics {
    /// Wall time spent in the completion call.
    pub elapsed: Duration,
    /// Prompt + completion tokens, as reported by the provider.
    pub total_tokens: u64,
    pub success: bool,
    /// Context breakdown; only counted for successful turns.
    pub context: Option<ContextText>,
}

impl TurnMetrics {
    pub fn succeeded(elapsed: Duration, total_tokens: u64, context: Option<ContextText>) -> Self {
        Self {
            elapsed,
            total_tokens,
            success: true,
            context,
        }
    }

    /// A failed turn: zero tokens, zero time.
    pub fn failed() -> Self {
        Self {
            elapsed: Duration::ZERO,
            total_tokens: 0,
            success: false,
            context: None,
        }
    }
}

// ── Aggregates ────────────────────────────────────────────────────────────

/// A user utterance for which retrieval came back empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyRetrievalEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

/// Process-wide accumulators, persisted as one record.
///
/// Every field has a default so older records with fewer fields still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Sum of completion-call wall time over successful turns, in seconds.
    pub total_response_time_secs: f64,
    pub total_conversation_tokens: u64,
    /// Static-instruction + retrieved-context tokens over successful turns.
    pub total_context_tokens: u64,
    pub total_cost_usd: f64,
    pub empty_retrieval_count: u64,
    /// Most recent empty-retrieval utterances, oldest first.
    pub empty_retrieval_queries: Vec<EmptyRetrievalEntry>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Result of decoding a stored metrics record.
#[derive(Debug)]
pub enum Decoded {
    /// The record parsed. `added` lists fields filled in from defaults.
    Valid {
        metrics: AggregateMetrics,
        added: Vec<String>,
    },
    /// The record is unreadable and must be archived.
    Corrupt(String),
}

impl AggregateMetrics {
    /// Parse a stored record, filling any missing fields from defaults.
    pub fn decode(raw: &str) -> Decoded {
        let mut value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => return Decoded::Corrupt(e.to_string()),
        };
        let Some(object) = value.as_object_mut() else {
            return Decoded::Corrupt("metrics record is not a JSON object".into());
        };

        let mut added = Vec::new();
        if let Ok(serde_json::Value::Object(defaults)) =
            serde_json::to_value(AggregateMetrics::default())
        {
            for (key, default) in defaults {
                if !object.contains_key(&key) {
                    object.insert(key.clone(), default);
                    added.push(key);
                }
            }
        }

        match serde_json::from_value(value) {
            Ok(metrics) => Decoded::Valid { metrics, added },
            Err(e) => Decoded::Corrupt(e.to_string()),
        }
    }

    /// Fold one turn in. Failed turns only bump the request counter.
    pub fn apply_turn(&mut self, turn: &TurnMetrics, cost_usd: f64, context_tokens: u64) {
        self.total_requests += 1;
        if turn.success {
            self.successful_requests += 1;
            self.total_response_time_secs += turn.elapsed.as_secs_f64();
            self.total_conversation_tokens += turn.total_tokens;
            self.total_context_tokens += context_tokens;
            self.total_cost_usd += cost_usd;
        }
    }

    /// Log an empty retrieval, keeping only the most recent `capacity` queries.
    pub fn push_empty_retrieval(&mut self, entry: EmptyRetrievalEntry, capacity: usize) {
        self.empty_retrieval_count += 1;
        self.empty_retrieval_queries.push(entry);
        if self.empty_retrieval_queries.len() > capacity {
            let excess = self.empty_retrieval_queries.len() - capacity;
            self.empty_retrieval_queries.drain(..excess);
        }
    }

    /// Derive the rates and averages report.
    pub fn summary(&self) -> MetricsSummary {
        let successes = self.successful_requests;
        let per_success = |total: f64| {
            if successes == 0 {
                0.0
            } else {
                total / successes as f64
            }
        };
        let success_rate = if self.total_requests == 0 {
            0.0
        } else {
            successes as f64 / self.total_requests as f64 * 100.0
        };

        MetricsSummary {
            total_requests: self.total_requests,
            successful_requests: successes,
            failed_requests: self.total_requests.saturating_sub(successes),
            success_rate_percent: round_to(success_rate, 1),
            average_response_time_secs: round_to(per_success(self.total_response_time_secs), 2),
            average_tokens_per_conversation: round_to(
                per_success(self.total_conversation_tokens as f64),
                1,
            ),
            average_context_size: round_to(per_success(self.total_context_tokens as f64), 1),
            average_cost_per_conversation: round_to(per_success(self.total_cost_usd), 6),
            total_tokens: self.total_conversation_tokens,
            total_cost_usd: self.total_cost_usd,
            empty_retrieval_count: self.empty_retrieval_count,
            empty_retrieval_queries: self.empty_retrieval_queries.clone(),
            last_updated: self.last_updated,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ── Summary report ────────────────────────────────────────────────────────

/// Rates and per-successful-turn averages derived from [`AggregateMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate_percent: f64,
    pub average_response_time_secs: f64,
    pub average_tokens_per_conversation: f64,
    pub average_context_size: f64,
    pub average_cost_per_conversation: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub empty_retrieval_count: u64,
    pub empty_retrieval_queries: Vec<EmptyRetrievalEntry>,
    pub last_updated: Option<DateTime<Utc>>,
}
