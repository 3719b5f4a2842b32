//! LLM provider implementations for shopchat.
//!
//! All providers implement the `shopchat_core::Provider` trait. The turn
//! service and the knowledge index only ever see `Arc<dyn Provider>`.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use shopchat_config::AppConfig;
use shopchat_core::error::ProviderError;
use shopchat_core::provider::Provider;
use std::sync::Arc;
use tracing::info;

/// Build the configured provider.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is available.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "No API key set (config api_key, SHOPCHAT_API_KEY or OPENAI_API_KEY)".into(),
            )
        })?;

    let provider = OpenAiCompatProvider::new("openai", &config.api_url, api_key)?;
    info!(url = %config.api_url, model = %config.model, "Provider configured");
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_not_configured() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn builds_with_api_key() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
