pub mod chat;
pub mod config;
pub mod doctor;
pub mod metrics;
pub mod pricing;
pub mod serve;

use shopchat_config::AppConfig;
use std::path::Path;

/// Load the config from `--config`, or from `~/.shopchat/config.toml`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}
