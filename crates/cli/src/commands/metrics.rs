//! `shopchat metrics` — print the aggregate metrics summary.

use crate::startup;
use shopchat_telemetry::MetricsRecorder;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = startup::open_metrics_store(&config).await?;
    let recorder = MetricsRecorder::from_config(store, &config.telemetry, &config.model);
    let summary = recorder.summary().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("ShopChat metrics");
    println!("─────────────────────────────────────");
    println!("  Requests:          {}", summary.total_requests);
    println!("  Successful:        {}", summary.successful_requests);
    println!("  Failed:            {}", summary.failed_requests);
    println!("  Success rate:      {:.1}%", summary.success_rate_percent);
    println!("  Avg response time: {:.2}s", summary.average_response_time_secs);
    println!("  Avg tokens/turn:   {:.1}", summary.average_tokens_per_conversation);
    println!("  Avg context size:  {:.1} tokens", summary.average_context_size);
    println!("  Avg cost/turn:     ${:.6}", summary.average_cost_per_conversation);
    println!("  Total tokens:      {}", summary.total_tokens);
    println!("  Total cost:        ${:.6}", summary.total_cost_usd);
    println!("  Empty retrievals:  {}", summary.empty_retrieval_count);

    if !summary.empty_retrieval_queries.is_empty() {
        println!();
        println!("  Most recent unanswered queries:");
        for entry in summary.empty_retrieval_queries.iter().rev().take(10) {
            println!(
                "    {}  {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.query
            );
        }
    }

    if let Some(updated) = summary.last_updated {
        println!();
        println!("  Last updated: {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}
