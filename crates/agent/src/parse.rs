//! Turning an LLM response into a validated plan or a reply.

use robovox_core::error::{PlanningError, ValidationError};
use robovox_core::message::{Message, MessageToolCall};
use robovox_core::plan::{Plan, PlanOrReply};
use robovox_core::skill::{CapabilitySchema, SkillCall};
use serde_json::{Map, Value};

/// Parse the assistant message into a plan (tool calls) or a reply (text).
///
/// Tool calls win over text: models often narrate alongside calls and the
/// narration is not spoken. Every call is validated against `schema`; the
/// first invalid call rejects the whole plan.
pub fn parse_response(
    message: &Message,
    schema: &CapabilitySchema,
) -> Result<PlanOrReply, PlanningError> {
    if !message.tool_calls.is_empty() {
        let calls = message
            .tool_calls
            .iter()
            .map(|tc| to_skill_call(tc, schema))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(PlanOrReply::Plan(Plan::new(calls)));
    }

    let text = message.content.trim();
    if text.is_empty() {
        return Err(PlanningError::Malformed(
            "response has neither text nor tool calls".into(),
        ));
    }
    Ok(PlanOrReply::Reply(text.to_string()))
}

fn to_skill_call(tc: &MessageToolCall, schema: &CapabilitySchema) -> Result<SkillCall, PlanningError> {
    let spec = schema
        .get(&tc.name)
        .ok_or_else(|| ValidationError::UnknownSkill(tc.name.clone()))?;
    let arguments = decode_arguments(tc)?;

    let call = if tc.id.is_empty() {
        SkillCall::new(&tc.name, arguments, spec.concurrency)
    } else {
        SkillCall::with_id(&tc.id, &tc.name, arguments, spec.concurrency)
    };
    schema.validate(&call)?;
    Ok(call)
}

/// Decode the raw argument string. An empty string means no arguments.
fn decode_arguments(tc: &MessageToolCall) -> Result<Map<String, Value>, PlanningError> {
    let raw = tc.arguments.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(PlanningError::Malformed(format!(
            "arguments for '{}' are not an object: {other}",
            tc.name
        ))),
        Err(e) => Err(PlanningError::Malformed(format!(
            "arguments for '{}' are not valid JSON: {e}",
            tc.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robovox_core::skill::{ArgSpec, ArgType, ConcurrencyClass, SkillSpec};

    fn schema() -> CapabilitySchema {
        let mut schema = CapabilitySchema::new();
        schema.register(SkillSpec {
            name: "move_to".into(),
            description: "Move".into(),
            args: vec![ArgSpec::required(
                "direction",
                ArgType::OneOf(vec!["forward".into(), "back".into()]),
                "Where",
            )],
            concurrency: ConcurrencyClass::Exclusive,
            interfaces: vec![],
            actuators: vec![],
        });
        schema.register(SkillSpec {
            name: "stop".into(),
            description: "Stop".into(),
            args: vec![],
            concurrency: ConcurrencyClass::Exclusive,
            interfaces: vec![],
            actuators: vec![],
        });
        schema
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn tool_calls_become_a_plan_in_order() {
        let msg = Message::tool_calls(vec![
            tool_call("call_1", "move_to", r#"{"direction":"forward"}"#),
            tool_call("call_2", "stop", ""),
        ]);
        let PlanOrReply::Plan(plan) = parse_response(&msg, &schema()).unwrap() else {
            panic!("expected a plan");
        };
        assert_eq!(plan.skill_names(), vec!["move_to", "stop"]);
        assert_eq!(plan.calls[0].id(), "call_1");
        assert!(plan.calls[1].is_exclusive());
    }

    #[test]
    fn text_becomes_a_reply() {
        let msg = Message::assistant("  All joints nominal.\n");
        assert_eq!(
            parse_response(&msg, &schema()).unwrap(),
            PlanOrReply::Reply("All joints nominal.".into())
        );
    }

    #[test]
    fn empty_response_is_malformed() {
        let msg = Message::assistant("   ");
        assert!(matches!(
            parse_response(&msg, &schema()),
            Err(PlanningError::Malformed(_))
        ));
    }

    #[test]
    fn invalid_json_arguments_are_malformed() {
        let msg = Message::tool_calls(vec![tool_call("c", "move_to", "{direction: forward")]);
        assert!(matches!(
            parse_response(&msg, &schema()),
            Err(PlanningError::Malformed(_))
        ));

        let msg = Message::tool_calls(vec![tool_call("c", "move_to", "[1, 2]")]);
        assert!(matches!(
            parse_response(&msg, &schema()),
            Err(PlanningError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_skill_rejects_the_whole_plan() {
        let msg = Message::tool_calls(vec![
            tool_call("c1", "stop", "{}"),
            tool_call("c2", "teleport", "{}"),
        ]);
        assert_eq!(
            parse_response(&msg, &schema()),
            Err(PlanningError::Validation(ValidationError::UnknownSkill(
                "teleport".into()
            )))
        );
    }

    #[test]
    fn unknown_skill_wins_over_garbled_arguments() {
        for raw in ["{speed: fast", "[1, 2]"] {
            let msg = Message::tool_calls(vec![tool_call("c", "teleport", raw)]);
            assert_eq!(
                parse_response(&msg, &schema()),
                Err(PlanningError::Validation(ValidationError::UnknownSkill(
                    "teleport".into()
                ))),
                "arguments {raw}"
            );
        }
    }

    #[test]
    fn bad_argument_is_not_corrected() {
        let msg = Message::tool_calls(vec![tool_call("c", "move_to", r#"{"direction":"sideways"}"#)]);
        assert!(matches!(
            parse_response(&msg, &schema()),
            Err(PlanningError::Validation(ValidationError::WrongType { .. }))
        ));

        let msg = Message::tool_calls(vec![tool_call("c", "move_to", "{}")]);
        assert!(matches!(
            parse_response(&msg, &schema()),
            Err(PlanningError::Validation(ValidationError::MissingArgument { .. }))
        ));
    }

    #[test]
    fn missing_id_gets_generated() {
        let msg = Message::tool_calls(vec![tool_call("", "stop", "null")]);
        let PlanOrReply::Plan(plan) = parse_response(&msg, &schema()).unwrap() else {
            panic!("expected a plan");
        };
        assert!(!plan.calls[0].id().is_empty());
    }
}
