//! `shopchat config` — print the effective configuration as TOML.

use shopchat_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>, defaults: bool) -> Result<(), Box<dyn std::error::Error>> {
    if defaults {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = super::load_config(config_path)?;
    print!("{}", config.to_toml()?);
    if config.has_api_key() {
        println!("\n# api_key is set (not shown)");
    }
    Ok(())
}
