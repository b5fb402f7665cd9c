//! LLM Provider implementations for robovox.
//!
//! All providers implement the `robovox_core::Provider` trait.
//! [`build_from_config`] wires the configured endpoint behind the retry policy.

pub mod openai_compat;
pub mod replay;
pub mod retry;

use std::path::Path;
use std::sync::Arc;

use robovox_config::LlmConfig;
use robovox_core::error::ProviderError;
use robovox_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;
pub use replay::{Recorded, RecordedCall, RecordedErrorKind, ReplayEntry, ReplayProvider};
pub use retry::RetryProvider;

/// Wrap a provider in the configured retry policy.
pub fn with_retry_policy(inner: Arc<dyn Provider>, config: &LlmConfig) -> Arc<dyn Provider> {
    Arc::new(
        RetryProvider::new(inner)
            .with_timeout(config.timeout())
            .with_max_retries(config.max_retries)
            .with_backoff_base(config.backoff_base()),
    )
}

/// Build the live provider from configuration.
pub fn build_from_config(config: &LlmConfig) -> Arc<dyn Provider> {
    let provider = OpenAiCompatProvider::new(
        "openai-compat",
        &config.api_url,
        config.api_key.clone(),
        config.timeout(),
    )
    .with_debug_logging(config.debug_logging);

    tracing::debug!(endpoint = %provider.endpoint(), model = %config.model, "LLM provider configured");
    with_retry_policy(Arc::new(provider), config)
}

/// Build a replay provider from a recorded table, behind the same retry policy.
pub fn build_replay(path: &Path, config: &LlmConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let replay = ReplayProvider::from_file(path)?;
    tracing::info!(path = %path.display(), utterances = replay.len(), "Loaded replay table");
    Ok(with_retry_policy(Arc::new(replay), config))
}
