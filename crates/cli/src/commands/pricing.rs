//! `shopchat pricing` — list the built-in model prices.

use shopchat_config::AppConfig;
use shopchat_telemetry::{ModelPricing, PricingTable};
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let table = PricingTable::with_defaults();
    let models = table.models();

    println!("Model pricing (USD per 1M tokens)");
    println!("─────────────────────────────────────────────────────");
    println!("{:<40} {:>10} {:>10}", "Model", "Input", "Output");

    for name in &models {
        if let Some(p) = table.lookup(name) {
            println!("{:<40} ${:>8.3} ${:>8.3}", name, p.input_per_m, p.output_per_m);
        }
    }

    println!();
    println!("  {} models with pricing data", models.len());
    println!();
    println!("  Configured model: {}", config.model);
    match active_pricing(&config, &table) {
        Some(p) => println!(
            "  Cost per 1M tokens (even input/output split): ${:.4}",
            p.blended_cost(1_000_000)
        ),
        None => println!("  No pricing known; costs are recorded as 0"),
    }

    Ok(())
}

fn active_pricing(config: &AppConfig, table: &PricingTable) -> Option<ModelPricing> {
    config
        .telemetry
        .pricing
        .map(ModelPricing::from)
        .or_else(|| table.lookup(&config.model))
}
