//! Configuration loading, validation, and management for robovox.
//!
//! Loads configuration from `~/.robovox/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.robovox/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM service connection and retry policy
    #[serde(default)]
    pub llm: LlmConfig,

    /// Prompt and context settings
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Skill execution settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Session lifetime
    #[serde(default)]
    pub session: SessionConfig,

    /// Speech output
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Robot hardware (simulated arm and workspace limits)
    #[serde(default)]
    pub hardware: HardwareConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-attempt timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transport failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Log full request/response payloads at debug level
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_base_ms() -> u64 {
    1000
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            debug_logging: false,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("debug_logging", &self.debug_logging)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Conversation context entries sent with each request
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_context_window() -> usize {
    20
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            context_window: default_context_window(),
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Extra attempts for a transiently failing hardware call
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,

    #[serde(default = "default_transient_retry_delay_ms")]
    pub transient_retry_delay_ms: u64,
}

fn default_transient_retries() -> u32 {
    1
}
fn default_transient_retry_delay_ms() -> u64 {
    250
}

impl ExecutorConfig {
    pub fn transient_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transient_retry_delay_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            transient_retries: default_transient_retries(),
            transient_retry_delay_ms: default_transient_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Silence after which the session is reset
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    120
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub tts_enabled: bool,

    /// Console playback pacing
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,
}

fn default_true() -> bool {
    true
}
fn default_words_per_minute() -> u32 {
    180
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            tts_enabled: true,
            words_per_minute: default_words_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Simulated duration of one motion command
    #[serde(default = "default_latency_ms")]
    pub simulated_latency_ms: u64,

    /// Per-joint [min, max] limits in degrees
    #[serde(default = "default_joint_limits")]
    pub joint_limits_deg: Vec<[f64; 2]>,

    /// Maximum distance of the tool point from the base
    #[serde(default = "default_max_reach_mm")]
    pub max_reach_mm: f64,

    /// Lowest allowed tool point height
    #[serde(default)]
    pub min_z_mm: f64,

    /// Step used by relative moves when no distance is given
    #[serde(default = "default_step_mm")]
    pub default_step_mm: f64,

    #[serde(default = "default_speed")]
    pub default_speed: f64,

    #[serde(default = "default_accel")]
    pub default_accel: f64,
}

fn default_latency_ms() -> u64 {
    200
}
fn default_joint_limits() -> Vec<[f64; 2]> {
    vec![[-170.0, 170.0]; 6]
}
fn default_max_reach_mm() -> f64 {
    850.0
}
fn default_step_mm() -> f64 {
    50.0
}
fn default_speed() -> f64 {
    50.0
}
fn default_accel() -> f64 {
    100.0
}

impl HardwareConfig {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ms: default_latency_ms(),
            joint_limits_deg: default_joint_limits(),
            max_reach_mm: default_max_reach_mm(),
            min_z_mm: 0.0,
            default_step_mm: default_step_mm(),
            default_speed: default_speed(),
            default_accel: default_accel(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`~/.robovox/config.toml`).
    ///
    /// Falls back to defaults if the file doesn't exist, then applies
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LLM_API_URL") {
            self.llm.api_url = url;
        }

        // LLM_API_KEY wins over the generic key
        if let Some(key) = lookup("LLM_API_KEY").or_else(|| lookup("ROBOVOX_API_KEY")) {
            self.llm.api_key = Some(key);
        }

        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Some(enabled) = lookup("TTS_ENABLED").and_then(|v| parse_flag(&v)) {
            self.speech.tts_enabled = enabled;
        }

        if let Some(debug) = lookup("LLM_DEBUG_LOGGING").and_then(|v| parse_flag(&v)) {
            self.llm.debug_logging = debug;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".robovox")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be > 0".into(),
            ));
        }

        if self.llm.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("llm.api_url must not be empty".into()));
        }

        if self.speech.words_per_minute == 0 {
            return Err(ConfigError::ValidationError(
                "speech.words_per_minute must be > 0".into(),
            ));
        }

        if self.hardware.max_reach_mm <= 0.0 {
            return Err(ConfigError::ValidationError(
                "hardware.max_reach_mm must be > 0".into(),
            ));
        }

        if let Some(i) = self
            .hardware
            .joint_limits_deg
            .iter()
            .position(|[min, max]| min >= max)
        {
            return Err(ConfigError::ValidationError(format!(
                "hardware.joint_limits_deg[{i}] must have min < max"
            )));
        }

        Ok(())
    }

    /// Check if an API key is available.
    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.timeout_secs, 10);
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.llm.backoff_base_ms, 1000);
        assert_eq!(config.planner.context_window, 20);
        assert_eq!(config.executor.transient_retries, 1);
        assert_eq!(config.session.idle_timeout_secs, 120);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.model, config.llm.model);
        assert_eq!(parsed.hardware.joint_limits_deg.len(), 6);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_joint_limit_rejected() {
        let mut config = AppConfig::default();
        config.hardware.joint_limits_deg[2] = [10.0, -10.0];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("joint_limits_deg[2]"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().llm.model, "gpt-4o-mini");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
model = "qwen2.5"
timeout_secs = 5

[executor]
transient_retry_delay_ms = 10
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.executor.transient_retry_delay_ms, 10);
        assert_eq!(config.executor.transient_retries, 1);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm\nmodel = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("LLM_API_URL", "http://localhost:11434/v1"),
            ("ROBOVOX_API_KEY", "generic"),
            ("LLM_MODEL", "llama3"),
            ("TTS_ENABLED", "false"),
            ("LLM_DEBUG_LOGGING", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.api_key.as_deref(), Some("generic"));
        assert_eq!(config.llm.model, "llama3");
        assert!(!config.speech.tts_enabled);
        assert!(config.llm.debug_logging);
    }

    #[test]
    fn specific_api_key_wins() {
        let mut config = AppConfig::default();
        config.apply_env(|k| match k {
            "LLM_API_KEY" => Some("specific".into()),
            "ROBOVOX_API_KEY" => Some("generic".into()),
            _ => None,
        });
        assert_eq!(config.llm.api_key.as_deref(), Some("specific"));
    }

    #[test]
    fn api_key_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("idle_timeout_secs"));
    }
}
