//! `shopchat doctor` — run every startup check and report each one.

use crate::startup;
use shopchat_core::Retriever;
use std::fmt::Display;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("ShopChat doctor");
    println!("========================================\n");

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            return Err("Config invalid".into());
        }
    };

    let mut issues = 0;

    issues += report(
        "API key",
        startup::check_api_key(&config).map(|_| "configured".to_string()),
    );

    let provider = startup::build_provider(&config);
    issues += report(
        "Provider",
        provider
            .as_ref()
            .map(|p| format!("{} at {}", p.name(), config.api_url)),
    );

    issues += report(
        "Static prompts",
        startup::load_instructions(&config).map(|_| {
            format!(
                "{} + {}",
                config.prompts.system_prompt, config.prompts.guidelines
            )
        }),
    );

    issues += report(
        "Session store",
        startup::open_session_store(&config)
            .await
            .map(|s| format!("{} backend healthy", s.name())),
    );

    match provider {
        Ok(provider) => issues += report(
            "Knowledge index",
            startup::build_knowledge_index(&config, provider)
                .await
                .map(|index| format!("{} chunks ({})", index.chunk_count(), index.name())),
        ),
        Err(_) => println!("  ⏭️  Knowledge index: skipped, no provider"),
    }

    issues += report(
        "Metrics store",
        startup::open_metrics_store(&config)
            .await
            .map(|s| format!("{} backend loaded", s.name())),
    );

    println!();
    if issues == 0 {
        println!("  All checks passed!");
        Ok(())
    } else {
        println!("  {issues} issue(s) found. See above for details.");
        Err(format!("{issues} startup check(s) failed").into())
    }
}

/// Print one check line. Returns 1 for a failure, 0 otherwise.
fn report<E: Display>(label: &str, outcome: Result<String, E>) -> usize {
    match outcome {
        Ok(detail) => {
            println!("  ✅ {label}: {detail}");
            0
        }
        Err(e) => {
            println!("  ❌ {label}: {e}");
            1
        }
    }
}
