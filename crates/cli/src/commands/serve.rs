//! `shopchat serve` — validate startup, then run the HTTP gateway.

use crate::startup;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let chat = startup::build_chat_service(&config).await?;

    println!("ShopChat gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.model);

    shopchat_gateway::start(&config.gateway, chat).await
}
