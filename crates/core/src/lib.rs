//! # Robovox Core
//!
//! Domain types, traits, and error definitions for the robovox voice-driven
//! robot orchestrator. This crate has no I/O of its own: it defines the model
//! every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator (LLM service, speech engines, hardware) is a trait here.
//! Implementations live in their respective crates, so the orchestrator can be
//! driven by real devices, simulators or recorded fixtures alike.

pub mod error;
pub mod event;
pub mod hardware;
pub mod message;
pub mod plan;
pub mod provider;
pub mod session;
pub mod skill;
pub mod speech;

// Re-export key types at crate root for ergonomics
pub use error::{
    FailureClass, HardwareError, PlanningError, ProviderError, SkillError, SpeechError,
    ValidationError,
};
pub use event::{DomainEvent, EventBus};
pub use hardware::{
    Joints, Kinematics, MotionDriver, MotionGoal, MoveHandle, Pose, RobotState, SafetyRules, Servo,
};
pub use message::{Message, MessageToolCall, Role};
pub use plan::{ExecutionResult, ExecutionStatus, Plan, PlanOrReply};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use session::{ActiveTurn, ConversationContext, Session, Turn, TurnOutcome};
pub use skill::{
    ActuatorKind, ArgSpec, ArgType, CapabilitySchema, ConcurrencyClass, HardwareInterface,
    SkillCall, SkillFailure, SkillHost, SkillResult, SkillSpec, SkillStatus,
};
pub use speech::{PlaybackOutcome, SpeechInput, SpeechOutput, TranscriptEvent};
