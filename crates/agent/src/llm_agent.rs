//! The LLM-backed planner.

use std::sync::Arc;

use async_trait::async_trait;
use robovox_config::AppConfig;
use robovox_core::error::PlanningError;
use robovox_core::plan::PlanOrReply;
use robovox_core::provider::Provider;
use robovox_core::session::ConversationContext;
use robovox_core::skill::CapabilitySchema;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Planner;
use crate::parse::parse_response;
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, build_request};

/// Plans turns by asking an LLM provider.
///
/// Retries and per-attempt timeouts belong to the provider stack (see
/// `robovox_providers::RetryProvider`); this type makes exactly one
/// `complete` call per turn.
pub struct LlmAgent {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    system_prompt: String,
}

impl LlmAgent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Build from the `llm` and `planner` config sections.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let mut agent = Self::new(provider, &config.llm.model)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens);
        if let Some(prompt) = &config.planner.system_prompt_override {
            agent = agent.with_system_prompt(prompt.clone());
        }
        agent
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Planner for LlmAgent {
    async fn plan(
        &self,
        transcript: &str,
        context: &ConversationContext,
        schema: &CapabilitySchema,
        cancel: &CancellationToken,
    ) -> Result<PlanOrReply, PlanningError> {
        let request = build_request(
            &self.system_prompt,
            &self.model,
            self.temperature,
            self.max_tokens,
            transcript,
            context,
            schema,
        );
        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            context_messages = context.len(),
            skills = request.tools.len(),
            "Submitting planning request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Planning cancelled before the LLM answered");
                return Err(PlanningError::Cancelled);
            }
            response = self.provider.complete(request) => response,
        };

        // A response that lands after cancellation is discarded.
        if cancel.is_cancelled() {
            debug!("Discarding late LLM response");
            return Err(PlanningError::Cancelled);
        }

        let response = response.map_err(|e| {
            warn!(provider = %self.provider.name(), error = %e, "LLM request failed");
            PlanningError::from(e)
        })?;

        match parse_response(&response.message, schema) {
            Ok(PlanOrReply::Plan(plan)) => {
                info!(plan_id = %plan.id, skills = ?plan.skill_names(), "Plan accepted");
                Ok(PlanOrReply::Plan(plan))
            }
            Ok(reply) => {
                info!("LLM replied without skill calls");
                Ok(reply)
            }
            Err(PlanningError::Validation(e)) => {
                warn!(
                    error = %e,
                    transcript,
                    "LLM proposed a call outside the capability schema; review the prompt against the skill registry"
                );
                Err(PlanningError::Validation(e))
            }
            Err(e) => {
                warn!(error = %e, "LLM response could not be parsed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robovox_core::error::ProviderError;
    use robovox_core::message::Message;
    use robovox_core::provider::{ProviderRequest, ProviderResponse};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers with fixed text after a delay and records the request.
    struct SlowProvider {
        delay: Duration,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            tokio::time::sleep(self.delay).await;
            Ok(ProviderResponse {
                message: Message::assistant("Hello there."),
                usage: None,
                model: "mock".into(),
            })
        }
    }

    fn slow(delay: Duration) -> Arc<SlowProvider> {
        Arc::new(SlowProvider {
            delay,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn config_sets_model_and_prompt() {
        let provider = slow(Duration::ZERO);
        let mut config = AppConfig::default();
        config.llm.model = "local-model".into();
        config.llm.max_tokens = Some(128);
        config.planner.system_prompt_override = Some("Only ever say hello.".into());

        let agent = LlmAgent::from_config(provider.clone(), &config);
        assert_eq!(agent.model(), "local-model");

        let out = agent
            .plan(
                "hi",
                &ConversationContext::new(4),
                &CapabilitySchema::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, PlanOrReply::Reply("Hello there.".into()));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].model, "local-model");
        assert_eq!(seen[0].max_tokens, Some(128));
        assert_eq!(seen[0].messages[0].content, "Only ever say hello.");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_the_call() {
        let agent = LlmAgent::new(slow(Duration::from_secs(5)), "m");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let out = agent
            .plan(
                "hi",
                &ConversationContext::new(4),
                &CapabilitySchema::new(),
                &cancel,
            )
            .await;
        assert_eq!(out, Err(PlanningError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn already_cancelled_never_calls_out() {
        let provider = slow(Duration::ZERO);
        let agent = LlmAgent::new(provider.clone(), "m");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let out = agent
            .plan("hi", &ConversationContext::new(4), &CapabilitySchema::new(), &cancel)
            .await;
        assert_eq!(out, Err(PlanningError::Cancelled));
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
