pub mod config_cmd;
pub mod doctor;
pub mod plan;
pub mod run;
pub mod skills;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use robovox_config::AppConfig;
use robovox_core::provider::Provider;

/// Where the config is read from: `--config` or `~/.robovox/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load, apply environment overrides and validate.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    let mut config = AppConfig::load_from(&path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// The LLM provider: a replay table when one is given, the live endpoint
/// otherwise. Both sit behind the configured retry policy.
pub fn build_provider(
    config: &AppConfig,
    replay: Option<&Path>,
) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    if let Some(path) = replay {
        return Ok(robovox_providers::build_replay(path, &config.llm)?);
    }

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No LLM API key configured!");
        eprintln!();
        eprintln!("  Set LLM_API_KEY (or ROBOVOX_API_KEY), or add api_key under [llm] in:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        eprintln!("  To try robovox without an LLM, pass --replay <table.json>.");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(robovox_providers::build_from_config(&config.llm))
}
