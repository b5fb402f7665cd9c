//! Request building for the planner.

use robovox_core::message::Message;
use robovox_core::provider::ProviderRequest;
use robovox_core::session::ConversationContext;
use robovox_core::skill::CapabilitySchema;

/// Default system prompt for a voice-driven robot arm.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You control a robot arm with a five-finger hand through the tools provided. \
The user talks to you by voice and hears your answers through a speaker.

When the user asks the robot to do something, respond only with tool calls, \
in the order they must happen. Do not invent tools or arguments that are not \
listed. Tools marked (exclusive) run alone; the others may run together.

When the user asks a question that needs no action, answer in one or two short \
spoken sentences without markdown, lists or emoji.

When the task is finished or the user says goodbye, call end_session with a \
short reason.";

/// Build the provider request for one transcript.
///
/// Message order is system prompt, then the context window oldest-first, then
/// the transcript. The tool list comes from the capability schema so the model
/// only ever sees skills the registry can run.
pub fn build_request(
    system_prompt: &str,
    model: &str,
    temperature: f32,
    max_tokens: Option<u32>,
    transcript: &str,
    context: &ConversationContext,
    schema: &CapabilitySchema,
) -> ProviderRequest {
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(context.window().cloned());
    messages.push(Message::user(transcript));

    ProviderRequest {
        model: model.to_string(),
        messages,
        temperature,
        max_tokens,
        tools: schema.tool_definitions(),
    }
}
