//! Skills: the typed robot actions the planner may request.
//!
//! The [`CapabilitySchema`] is the contract shared by the planner, the
//! executor and the hardware adapter: every [`SkillCall`] is checked against
//! it before anything moves. A [`SkillHost`] owns the schema and is the only
//! thing allowed to turn a call into hardware activity.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FailureClass, HardwareError, ValidationError};
use crate::provider::ToolDefinition;

/// Scheduling intent of a skill call relative to the rest of its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyClass {
    /// Must run alone; acts as a barrier between batches.
    Exclusive,
    /// May run concurrently with neighbouring parallel-safe calls.
    ParallelSafe,
}

impl std::fmt::Display for ConcurrencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exclusive => write!(f, "exclusive"),
            Self::ParallelSafe => write!(f, "parallel-safe"),
        }
    }
}

/// Hardware capability interfaces a skill may issue calls against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareInterface {
    Motion,
    Kinematics,
    Servo,
}

/// Physical actuator families a skill can touch. The concrete actuator
/// (which finger, which servo channel) is resolved per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    Arm,
    Gripper,
    Finger,
    Servo,
}

/// The JSON type an argument must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    Number,
    Integer,
    String,
    Boolean,
    NumberList,
    OneOf(Vec<String>),
}

impl ArgType {
    /// Whether a JSON value has this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::NumberList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_number)),
            Self::OneOf(options) => value
                .as_str()
                .is_some_and(|s| options.iter().any(|o| o == s)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Number => "a number".into(),
            Self::Integer => "an integer".into(),
            Self::String => "a string".into(),
            Self::Boolean => "a boolean".into(),
            Self::NumberList => "a list of numbers".into(),
            Self::OneOf(options) => format!("one of {}", options.join("|")),
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            Self::Number => serde_json::json!({ "type": "number" }),
            Self::Integer => serde_json::json!({ "type": "integer" }),
            Self::String => serde_json::json!({ "type": "string" }),
            Self::Boolean => serde_json::json!({ "type": "boolean" }),
            Self::NumberList => serde_json::json!({ "type": "array", "items": { "type": "number" } }),
            Self::OneOf(options) => serde_json::json!({ "type": "string", "enum": options }),
        }
    }
}

/// One argument of a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub ty: ArgType,
    pub required: bool,
    pub description: String,
    /// Inclusive numeric bounds. Only meaningful for numeric types; list
    /// arguments apply them to every element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

impl ArgSpec {
    pub fn required(name: &str, ty: ArgType, description: &str) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: description.into(),
            range: None,
        }
    }

    pub fn optional(name: &str, ty: ArgType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    /// Restrict the argument to `min..=max`.
    pub fn within(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    fn describe_range(&self) -> String {
        match self.range {
            Some((min, max)) => format!("between {min} and {max}"),
            None => "in range".into(),
        }
    }

    /// Whether a value already known to have the right type lies in range.
    fn in_range(&self, value: &Value) -> bool {
        let Some((min, max)) = self.range else {
            return true;
        };
        let inside = |v: &Value| v.as_f64().is_some_and(|f| (min..=max).contains(&f));
        match value.as_array() {
            Some(items) => items.iter().all(inside),
            None if value.is_number() => inside(value),
            None => true,
        }
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.ty.json_schema();
        schema["description"] = Value::String(self.description.clone());
        if let Some((min, max)) = self.range {
            let target = if schema.get("items").is_some() {
                &mut schema["items"]
            } else {
                &mut schema
            };
            target["minimum"] = min.into();
            target["maximum"] = max.into();
        }
        schema
    }
}

/// A capability schema entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSpec {
    pub name: String,
    pub description: String,
    pub args: Vec<ArgSpec>,
    pub concurrency: ConcurrencyClass,
    /// Hardware interfaces this skill issues calls against (empty for
    /// skills handled entirely by the orchestrator).
    pub interfaces: Vec<HardwareInterface>,
    /// Actuator families this skill moves (empty for read-only skills).
    pub actuators: Vec<ActuatorKind>,
}

impl SkillSpec {
    /// Convert this entry into a ToolDefinition for sending to the LLM.
    pub fn to_definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for arg in &self.args {
            properties.insert(arg.name.clone(), arg.json_schema());
            if arg.required {
                required.push(Value::String(arg.name.clone()));
            }
        }

        ToolDefinition {
            name: self.name.clone(),
            description: format!("{} ({})", self.description, self.concurrency),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }),
        }
    }

    /// Check a keyed argument map against this entry.
    pub fn check_arguments(
        &self,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<(), ValidationError> {
        for key in arguments.keys() {
            if !self.args.iter().any(|a| &a.name == key) {
                return Err(ValidationError::UnexpectedArgument {
                    skill: self.name.clone(),
                    argument: key.clone(),
                });
            }
        }

        for arg in &self.args {
            match arguments.get(&arg.name) {
                None | Some(Value::Null) if arg.required => {
                    return Err(ValidationError::MissingArgument {
                        skill: self.name.clone(),
                        argument: arg.name.clone(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !arg.ty.accepts(value) => {
                    return Err(ValidationError::WrongType {
                        skill: self.name.clone(),
                        argument: arg.name.clone(),
                        expected: arg.ty.describe(),
                    });
                }
                Some(value) if !arg.in_range(value) => {
                    return Err(ValidationError::OutOfRange {
                        skill: self.name.clone(),
                        argument: arg.name.clone(),
                        expected: arg.describe_range(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// The set of skills a robot exposes.
///
/// Built once at startup and shared read-only afterwards; there is no way to
/// remove an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySchema {
    skills: BTreeMap<String, SkillSpec>,
}

impl CapabilitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill. Replaces any existing entry with the same name.
    pub fn register(&mut self, spec: SkillSpec) {
        if self.skills.contains_key(&spec.name) {
            tracing::warn!(skill = %spec.name, "Replacing duplicate capability schema entry");
        }
        self.skills.insert(spec.name.clone(), spec);
    }

    /// Get a skill entry by name.
    pub fn get(&self, name: &str) -> Option<&SkillSpec> {
        self.skills.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// All skill names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &SkillSpec> {
        self.skills.values()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.skills.values().map(SkillSpec::to_definition).collect()
    }

    /// Validate a call: the skill exists, the declared concurrency class
    /// matches the registry, and every argument has the right shape.
    pub fn validate(&self, call: &SkillCall) -> Result<(), ValidationError> {
        let spec = self
            .get(call.name())
            .ok_or_else(|| ValidationError::UnknownSkill(call.name().to_string()))?;

        if spec.concurrency != call.concurrency() {
            return Err(ValidationError::ConcurrencyMismatch {
                skill: spec.name.clone(),
                declared: call.concurrency().to_string(),
                registered: spec.concurrency.to_string(),
            });
        }

        spec.check_arguments(call.arguments())
    }
}

/// A request to run one skill. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillCall {
    id: String,
    name: String,
    arguments: serde_json::Map<String, Value>,
    concurrency: ConcurrencyClass,
}

impl SkillCall {
    pub fn new(
        name: impl Into<String>,
        arguments: serde_json::Map<String, Value>,
        concurrency: ConcurrencyClass,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, arguments, concurrency)
    }

    /// Create a call keeping an externally assigned ID (e.g. the LLM's tool_call.id).
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, Value>,
        concurrency: ConcurrencyClass,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            concurrency,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &serde_json::Map<String, Value> {
        &self.arguments
    }

    pub fn concurrency(&self) -> ConcurrencyClass {
        self.concurrency
    }

    pub fn is_exclusive(&self) -> bool {
        self.concurrency == ConcurrencyClass::Exclusive
    }
}

/// Outcome of a single skill call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillStatus {
    Ok,
    Failed,
    Skipped,
}

/// Why a skill call failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillFailure {
    pub class: FailureClass,
    pub message: String,
}

impl From<&HardwareError> for SkillFailure {
    fn from(err: &HardwareError) -> Self {
        Self {
            class: err.class(),
            message: err.to_string(),
        }
    }
}

impl From<&ValidationError> for SkillFailure {
    fn from(err: &ValidationError) -> Self {
        Self {
            class: FailureClass::Rejected,
            message: err.to_string(),
        }
    }
}

/// The result of a skill call. One per [`SkillCall`] in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResult {
    pub call_id: String,
    pub skill: String,
    pub status: SkillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SkillFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Hardware attempts made (0 when the call never reached hardware).
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub duration_ms: u64,
}

impl SkillResult {
    pub fn ok(call: &SkillCall, payload: Option<Value>) -> Self {
        Self {
            call_id: call.id().to_string(),
            skill: call.name().to_string(),
            status: SkillStatus::Ok,
            error: None,
            payload,
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn failed(call: &SkillCall, failure: SkillFailure) -> Self {
        Self {
            call_id: call.id().to_string(),
            skill: call.name().to_string(),
            status: SkillStatus::Failed,
            error: Some(failure),
            payload: None,
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn skipped(call: &SkillCall) -> Self {
        Self {
            call_id: call.id().to_string(),
            skill: call.name().to_string(),
            status: SkillStatus::Skipped,
            error: None,
            payload: None,
            attempts: 0,
            duration_ms: 0,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == SkillStatus::Ok
    }

    pub fn is_failed(&self) -> bool {
        self.status == SkillStatus::Failed
    }

    pub fn is_fatal(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.class == FailureClass::Fatal)
    }
}

/// The hardware-facing side of the skill contract.
///
/// Implementations own the capability schema and the mapping from skill to
/// hardware calls. `invoke` never returns an error: every outcome, including
/// rejected arguments, is reported as a [`SkillResult`].
#[async_trait]
pub trait SkillHost: Send + Sync {
    /// The registry's capability schema.
    fn schema(&self) -> &CapabilitySchema;

    /// Run one skill call to completion.
    async fn invoke(&self, call: &SkillCall) -> SkillResult;

    /// Whether in-flight hardware calls can be safely aborted.
    fn supports_abort(&self) -> bool {
        false
    }

    /// Best-effort abort of whatever the hardware is doing right now.
    async fn abort(&self) -> std::result::Result<(), HardwareError> {
        Err(HardwareError::AbortUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn schema() -> CapabilitySchema {
        let mut schema = CapabilitySchema::new();
        schema.register(SkillSpec {
            name: "move_to".into(),
            description: "Move in a direction".into(),
            args: vec![
                ArgSpec::required(
                    "direction",
                    ArgType::OneOf(vec!["forward".into(), "back".into()]),
                    "Direction of travel",
                ),
                ArgSpec::optional("distance_mm", ArgType::Number, "Distance"),
            ],
            concurrency: ConcurrencyClass::Exclusive,
            interfaces: vec![HardwareInterface::Motion],
            actuators: vec![ActuatorKind::Arm],
        });
        schema.register(SkillSpec {
            name: "set_servo_angle".into(),
            description: "Set a servo angle".into(),
            args: vec![
                ArgSpec::required("angle", ArgType::Integer, "Angle in degrees").within(0.0, 180.0),
            ],
            concurrency: ConcurrencyClass::ParallelSafe,
            interfaces: vec![HardwareInterface::Servo],
            actuators: vec![ActuatorKind::Servo],
        });
        schema
    }

    #[test]
    fn valid_call_passes() {
        let call = SkillCall::new(
            "move_to",
            args(serde_json::json!({"direction": "forward", "distance_mm": 50})),
            ConcurrencyClass::Exclusive,
        );
        assert!(schema().validate(&call).is_ok());
    }

    #[test]
    fn unknown_skill_rejected() {
        let call = SkillCall::new("fly", serde_json::Map::new(), ConcurrencyClass::Exclusive);
        assert_eq!(
            schema().validate(&call),
            Err(ValidationError::UnknownSkill("fly".into()))
        );
    }

    #[test]
    fn missing_and_mistyped_arguments_rejected() {
        let missing = SkillCall::new("move_to", serde_json::Map::new(), ConcurrencyClass::Exclusive);
        assert!(matches!(
            schema().validate(&missing),
            Err(ValidationError::MissingArgument { .. })
        ));

        let mistyped = SkillCall::new(
            "move_to",
            args(serde_json::json!({"direction": "sideways"})),
            ConcurrencyClass::Exclusive,
        );
        assert!(matches!(
            schema().validate(&mistyped),
            Err(ValidationError::WrongType { .. })
        ));

        let extra = SkillCall::new(
            "move_to",
            args(serde_json::json!({"direction": "forward", "speed": 3})),
            ConcurrencyClass::Exclusive,
        );
        assert!(matches!(
            schema().validate(&extra),
            Err(ValidationError::UnexpectedArgument { .. })
        ));
    }

    #[test]
    fn integer_accepts_whole_floats_only() {
        assert!(ArgType::Integer.accepts(&serde_json::json!(90)));
        assert!(ArgType::Integer.accepts(&serde_json::json!(90.0)));
        assert!(!ArgType::Integer.accepts(&serde_json::json!(90.5)));
        assert!(!ArgType::Integer.accepts(&serde_json::json!("90")));
    }

    #[test]
    fn out_of_range_values_rejected() {
        let call = |angle: Value| {
            SkillCall::new(
                "set_servo_angle",
                args(serde_json::json!({ "angle": angle })),
                ConcurrencyClass::ParallelSafe,
            )
        };
        assert!(schema().validate(&call(serde_json::json!(180))).is_ok());
        assert!(schema().validate(&call(serde_json::json!(0))).is_ok());
        let err = schema().validate(&call(serde_json::json!(200))).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref argument, .. } if argument == "angle"));
        assert!(err.to_string().contains("between 0 and 180"));
        assert!(schema().validate(&call(serde_json::json!(-1))).is_err());
    }

    #[test]
    fn list_ranges_apply_to_each_element() {
        let spec = ArgSpec::required("joints", ArgType::NumberList, "Joints").within(-90.0, 90.0);
        assert!(spec.in_range(&serde_json::json!([0, 45, -90])));
        assert!(!spec.in_range(&serde_json::json!([0, 91])));
        assert_eq!(spec.json_schema()["items"]["maximum"], serde_json::json!(90.0));
    }

    #[test]
    fn stale_concurrency_class_rejected() {
        let call = SkillCall::new(
            "set_servo_angle",
            args(serde_json::json!({"angle": 10})),
            ConcurrencyClass::Exclusive,
        );
        assert!(matches!(
            schema().validate(&call),
            Err(ValidationError::ConcurrencyMismatch { .. })
        ));
    }

    #[test]
    fn tool_definitions_carry_json_schema() {
        let defs = schema().tool_definitions();
        assert_eq!(defs.len(), 2);
        let move_to = defs.iter().find(|d| d.name == "move_to").unwrap();
        assert_eq!(move_to.parameters["required"], serde_json::json!(["direction"]));
        assert_eq!(
            move_to.parameters["properties"]["direction"]["enum"],
            serde_json::json!(["forward", "back"])
        );
        assert!(move_to.description.contains("exclusive"));
        assert!(move_to.parameters["properties"]["direction"].get("minimum").is_none());

        let servo = defs.iter().find(|d| d.name == "set_servo_angle").unwrap();
        let angle = &servo.parameters["properties"]["angle"];
        assert_eq!(angle["minimum"], serde_json::json!(0.0));
        assert_eq!(angle["maximum"], serde_json::json!(180.0));
        assert_eq!(angle["type"], "integer");
    }

    #[test]
    fn fatal_result_detection() {
        let call = SkillCall::new("move_to", serde_json::Map::new(), ConcurrencyClass::Exclusive);
        let result = SkillResult::failed(
            &call,
            SkillFailure::from(&HardwareError::Fatal("overcurrent".into())),
        );
        assert!(result.is_failed());
        assert!(result.is_fatal());
        assert!(!SkillResult::skipped(&call).is_fatal());
    }
}
