//! Planning for robovox.
//!
//! A [`Planner`] turns one transcript plus the conversation window into
//! either a validated [`Plan`](robovox_core::Plan) or a plain-text reply.
//! [`LlmAgent`] is the LLM-backed implementation:
//!
//! 1. **Build** the request (system prompt, context oldest-first, transcript,
//!    one tool definition per registered skill)
//! 2. **Submit** it to the provider, abandoning the call on cancellation
//! 3. **Parse** tool calls into a plan, text into a reply
//! 4. **Validate** every call against the capability schema; one bad call
//!    rejects the plan

pub mod llm_agent;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;
use robovox_core::error::PlanningError;
use robovox_core::plan::PlanOrReply;
use robovox_core::session::ConversationContext;
use robovox_core::skill::CapabilitySchema;
use tokio_util::sync::CancellationToken;

pub use llm_agent::LlmAgent;
pub use parse::parse_response;
pub use prompt::{DEFAULT_SYSTEM_PROMPT, build_request};

/// Produces a plan or a reply for one turn.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan one transcript. Returns [`PlanningError::Cancelled`] promptly
    /// once `cancel` fires; any late answer is dropped.
    async fn plan(
        &self,
        transcript: &str,
        context: &ConversationContext,
        schema: &CapabilitySchema,
        cancel: &CancellationToken,
    ) -> Result<PlanOrReply, PlanningError>;
}
