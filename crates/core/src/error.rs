//! Error types for the robovox domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum and is returned as-is by the
//! interface that raises it. Binaries box whatever reaches `main`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an LLM transport.
///
/// `Timeout`, `Network`, `RateLimited` and 5xx `ApiError`s are transport
/// failures and may be retried; everything else is reported as-is.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether this failure is a transport hiccup worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::RateLimited { .. } => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) | Self::MalformedResponse(_) => {
                false
            }
        }
    }
}

/// Errors surfaced by the planning interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("LLM service timed out: {0}")]
    Timeout(String),

    #[error("LLM service unreachable: {0}")]
    Transport(String),

    #[error("LLM returned a malformed response: {0}")]
    Malformed(String),

    #[error("LLM proposed an invalid plan: {0}")]
    Validation(#[from] ValidationError),

    #[error("Planning cancelled")]
    Cancelled,
}

impl From<ProviderError> for PlanningError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(msg) => Self::Timeout(msg),
            ProviderError::MalformedResponse(msg) => Self::Malformed(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// A skill call that does not match the capability schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown skill '{0}'")]
    UnknownSkill(String),

    #[error("skill '{skill}' is missing required argument '{argument}'")]
    MissingArgument { skill: String, argument: String },

    #[error("skill '{skill}' argument '{argument}' must be {expected}")]
    WrongType {
        skill: String,
        argument: String,
        expected: String,
    },

    #[error("skill '{skill}' does not accept argument '{argument}'")]
    UnexpectedArgument { skill: String, argument: String },

    #[error("skill '{skill}' argument '{argument}' must be {expected}")]
    OutOfRange {
        skill: String,
        argument: String,
        expected: String,
    },

    #[error("skill '{skill}' declared as {declared} but the registry says {registered}")]
    ConcurrencyMismatch {
        skill: String,
        declared: String,
        registered: String,
    },
}

/// Errors raised while turning a call into a typed skill.
#[derive(Debug, Clone, Error)]
pub enum SkillError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("invalid value for '{argument}': {reason}")]
    OutOfRange { argument: String, reason: String },
}

/// How a hardware failure should be treated by the layers above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Momentary failure; safe to retry.
    Transient,
    /// Unsafe to continue; aborts the whole plan.
    Fatal,
    /// Neither retried nor fatal: bad arguments, a safety rule, or an abort.
    Rejected,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Errors reported by hardware capability interfaces.
#[derive(Debug, Clone, Error)]
pub enum HardwareError {
    #[error("transient hardware failure: {0}")]
    Transient(String),

    #[error("fatal hardware failure: {0}")]
    Fatal(String),

    #[error("motion rejected by safety rules: {0}")]
    SafetyViolation(String),

    #[error("motion aborted")]
    Aborted,

    #[error("abort is not supported by this hardware")]
    AbortUnsupported,
}

impl HardwareError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Transient(_) => FailureClass::Transient,
            Self::Fatal(_) => FailureClass::Fatal,
            Self::SafetyViolation(_) | Self::Aborted | Self::AbortUnsupported => {
                FailureClass::Rejected
            }
        }
    }
}

/// Errors from the speech boundaries.
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    #[error("playback failed: {0}")]
    Playback(String),

    #[error("speech input closed")]
    InputClosed,
}
