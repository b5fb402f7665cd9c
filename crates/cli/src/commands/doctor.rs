//! `robovox doctor`: Diagnose system health.

use std::path::Path;

use robovox_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 robovox doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let path = super::config_path(config_path);
    let config = if path.exists() {
        match super::load_config(config_path) {
            Ok(config) => {
                println!("  ✅ Config file valid ({})", path.display());
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                println!("\n  ⚠️  Fix the config before running other checks.");
                return Ok(());
            }
        }
    } else {
        println!("  ⚠️  No config file at {}, using defaults", path.display());
        let mut config = AppConfig::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    };

    let schema = robovox_robot::catalogue_schema();
    println!("  ✅ {} skills registered", schema.len());

    let (_arm, tools) = robovox_robot::simulated(&config);
    match tools.get_state().await {
        Ok(state) => println!(
            "  ✅ Simulated arm responding (tcp {:.0}, {:.0}, {:.0} mm)",
            state.tcp.x, state.tcp.y, state.tcp.z
        ),
        Err(e) => {
            println!("  ❌ Simulated arm error: {e}");
            issues += 1;
        }
    }

    if config.has_api_key() {
        println!("  ✅ LLM API key configured");
        let provider = robovox_providers::build_from_config(&config.llm);
        match provider.health_check().await {
            Ok(true) => println!("  ✅ LLM endpoint reachable ({})", config.llm.api_url),
            Ok(false) => {
                println!("  ⚠️  LLM endpoint answered with an error ({})", config.llm.api_url);
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ LLM endpoint unreachable: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No LLM API key — set LLM_API_KEY or use --replay");
        issues += 1;
    }

    if !config.speech.tts_enabled {
        println!("  ℹ️  Speech output disabled (responses are only logged)");
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
