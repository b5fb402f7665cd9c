//! `robovox config`: Configuration helpers.

use std::path::Path;

use robovox_config::AppConfig;

pub fn print_default() {
    print!("{}", AppConfig::default_toml());
}

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    if config.llm.api_key.is_some() {
        config.llm.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", super::config_path(config_path).display());
}
