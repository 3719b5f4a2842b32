//! Built-in pricing table for common LLM models.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price. A custom price for the configured model can be supplied
//! through the `[telemetry.pricing]` config section.

use serde::{Deserialize, Serialize};
use shopchat_config::PricingOverrideConfig;
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Cost of `total_tokens` assuming an even input/output split.
    ///
    /// Providers report one combined count per turn; this is an estimate,
    /// not the provider's bill.
    pub fn blended_cost(&self, total_tokens: u64) -> f64 {
        total_tokens as f64 / 1_000_000.0 * (self.input_per_m + self.output_per_m) / 2.0
    }
}

impl From<PricingOverrideConfig> for ModelPricing {
    fn from(config: PricingOverrideConfig) -> Self {
        Self::new(config.input_per_m, config.output_per_m)
    }
}

/// Pricing table with built-in defaults.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

const PROVIDER_PREFIXES: &[&str] = &["openai", "anthropic", "google", "mistral"];

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── OpenAI ─────────────────────────────────────────────────
        prices.insert("openai/gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        prices.insert("openai/gpt-4o-mini".into(), ModelPricing::new(0.15, 0.6));
        prices.insert("openai/gpt-4.1".into(), ModelPricing::new(2.0, 8.0));
        prices.insert("openai/gpt-4.1-mini".into(), ModelPricing::new(0.4, 1.6));
        prices.insert("openai/gpt-4.1-nano".into(), ModelPricing::new(0.1, 0.4));
        prices.insert("openai/gpt-4-turbo".into(), ModelPricing::new(10.0, 30.0));
        prices.insert("openai/gpt-3.5-turbo".into(), ModelPricing::new(0.5, 1.5));
        prices.insert("openai/o3-mini".into(), ModelPricing::new(1.1, 4.4));

        // ── Anthropic ──────────────────────────────────────────────
        prices.insert(
            "anthropic/claude-3.5-haiku".into(),
            ModelPricing::new(0.8, 4.0),
        );
        prices.insert(
            "anthropic/claude-sonnet-4".into(),
            ModelPricing::new(3.0, 15.0),
        );

        // ── Google ─────────────────────────────────────────────────
        prices.insert(
            "google/gemini-2.0-flash".into(),
            ModelPricing::new(0.1, 0.4),
        );

        // ── Mistral ────────────────────────────────────────────────
        prices.insert("mistral/mistral-small".into(), ModelPricing::new(0.2, 0.6));

        Self { prices }
    }

    /// Look up pricing for a model.
    ///
    /// Tries an exact match first, then common provider prefixes
    /// (`gpt-4o` → `openai/gpt-4o`), then the longest known bare name that
    /// prefixes the model (`gpt-4o-mini-2024-07-18` → `gpt-4o-mini`).
    pub fn lookup(&self, model: &str) -> Option<ModelPricing> {
        // 1. Exact match
        if let Some(p) = self.prices.get(model) {
            return Some(*p);
        }

        // 2. Provider prefixes
        for prefix in PROVIDER_PREFIXES {
            if let Some(p) = self.prices.get(&format!("{prefix}/{model}")) {
                return Some(*p);
            }
        }

        // 3. Longest bare-name prefix
        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        self.prices
            .iter()
            .map(|(key, pricing)| (key.rsplit('/').next().unwrap_or(key), pricing))
            .filter(|(bare_key, _)| bare_model.starts_with(&bare_key.to_lowercase()))
            .max_by_key(|(bare_key, _)| bare_key.len())
            .map(|(_, p)| *p)
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blended_cost_uses_even_split() {
        let p = ModelPricing::new(0.15, 0.6);
        // 1M tokens at (0.15 + 0.6) / 2
        assert!((p.blended_cost(1_000_000) - 0.375).abs() < 1e-12);
        assert!((p.blended_cost(100) - 0.0000375).abs() < 1e-12);
    }

    #[test]
    fn bare_model_resolves_through_provider_prefix() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.lookup("gpt-4o-mini"), Some(ModelPricing::new(0.15, 0.6)));
        assert_eq!(table.lookup("gpt-4o"), Some(ModelPricing::new(2.5, 10.0)));
    }

    #[test]
    fn versioned_model_matches_longest_prefix() {
        let table = PricingTable::with_defaults();
        assert_eq!(
            table.lookup("gpt-4o-mini-2024-07-18"),
            Some(ModelPricing::new(0.15, 0.6))
        );
        assert_eq!(
            table.lookup("openai/gpt-4.1-mini-2025-04-14"),
            Some(ModelPricing::new(0.4, 1.6))
        );
    }

    #[test]
    fn unknown_model_is_none() {
        let table = PricingTable::with_defaults();
        assert!(table.lookup("llama-local").is_none());
    }

    #[test]
    fn list_models_sorted() {
        let models = PricingTable::with_defaults().models();
        assert!(models.contains(&"openai/gpt-4o-mini".to_string()));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
    }
}
