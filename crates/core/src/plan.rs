//! Plans and their execution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::skill::{SkillCall, SkillResult, SkillStatus};

/// An ordered list of skill calls produced for one turn.
///
/// A plan only exists once every call has passed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub calls: Vec<SkillCall>,
}

impl Plan {
    pub fn new(calls: Vec<SkillCall>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            calls,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Skill names in plan order.
    pub fn skill_names(&self) -> Vec<&str> {
        self.calls.iter().map(SkillCall::name).collect()
    }
}

/// What the planner produced for a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PlanOrReply {
    Plan(Plan),
    Reply(String),
}

/// Aggregate status of a plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every call succeeded.
    Ok,
    /// At least one parallel-safe call failed, execution carried on.
    Partial,
    /// An exclusive or fatal failure halted the remaining calls.
    Aborted,
    /// A barge-in stopped dispatch.
    Cancelled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Partial => write!(f, "partial"),
            Self::Aborted => write!(f, "aborted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The outcome of running a [`Plan`]: one [`SkillResult`] per call.
///
/// Results of a concurrent batch appear in completion order; calls that never
/// ran are appended as `skipped` in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: String,
    pub status: ExecutionStatus,
    pub results: Vec<SkillResult>,
    /// Set when a fatal hardware failure stopped the plan.
    #[serde(default)]
    pub fatal: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Derive the aggregate status from per-call results.
    ///
    /// `cancelled` wins over everything, then `aborted`; otherwise any failure
    /// makes the run `partial`.
    pub fn aggregate(results: &[SkillResult], aborted: bool, cancelled: bool) -> ExecutionStatus {
        if cancelled {
            ExecutionStatus::Cancelled
        } else if aborted {
            ExecutionStatus::Aborted
        } else if results.iter().all(|r| r.status == SkillStatus::Ok) {
            ExecutionStatus::Ok
        } else {
            ExecutionStatus::Partial
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecutionStatus::Ok
    }

    pub fn count(&self, status: SkillStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// The first failed result, if any.
    pub fn first_failure(&self) -> Option<&SkillResult> {
        self.results.iter().find(|r| r.is_failed())
    }

    pub fn result_for(&self, call_id: &str) -> Option<&SkillResult> {
        self.results.iter().find(|r| r.call_id == call_id)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
