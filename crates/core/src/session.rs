//! Sessions and turns.
//!
//! A [`Session`] is one continuous interaction. It owns its finalized
//! [`Turn`]s and the bounded [`ConversationContext`] fed back to the planner.
//! Nothing here outlives the session.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;
use crate::plan::{ExecutionResult, Plan};

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// A plan ran (with any execution status other than cancelled).
    Completed,
    /// The planner answered with text only.
    Replied,
    /// A barge-in interrupted the turn.
    Cancelled,
    /// The turn failed; the error was spoken.
    Error,
}

impl std::fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Replied => write!(f, "replied"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A turn under construction. Owned by whoever is running the turn.
#[derive(Debug, Clone)]
pub struct ActiveTurn {
    id: String,
    transcript: String,
    plan: Option<Plan>,
    execution: Option<ExecutionResult>,
    response: Option<String>,
    error: Option<String>,
    started_at: DateTime<Utc>,
}

impl ActiveTurn {
    pub fn begin(transcript: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transcript: transcript.into(),
            plan: None,
            execution: None,
            response: None,
            error: None,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
    }

    pub fn set_execution(&mut self, execution: ExecutionResult) {
        self.execution = Some(execution);
    }

    pub fn set_response(&mut self, response: impl Into<String>) {
        self.response = Some(response.into());
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn execution(&self) -> Option<&ExecutionResult> {
        self.execution.as_ref()
    }

    /// Freeze the turn.
    pub fn finalize(self, outcome: TurnOutcome) -> Turn {
        Turn {
            id: self.id,
            transcript: self.transcript,
            plan: self.plan,
            execution: self.execution,
            response: self.response,
            outcome,
            error: self.error,
            started_at: self.started_at,
            finalized_at: Utc::now(),
        }
    }
}

/// A finalized utterance-to-response cycle. Plain data; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub transcript: String,
    pub plan: Option<Plan>,
    pub execution: Option<ExecutionResult>,
    /// The text that was (or was about to be) spoken.
    pub response: Option<String>,
    pub outcome: TurnOutcome,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
}

/// Bounded window of recent exchanges, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    capacity: usize,
    entries: VecDeque<Message>,
}

impl ConversationContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn push(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// Append the exchange of a finalized turn.
    pub fn record(&mut self, turn: &Turn) {
        self.push(Message::user(turn.transcript.clone()));

        let summary = match (turn.outcome, turn.response.as_deref()) {
            (TurnOutcome::Cancelled, _) => "(interrupted by the user)".to_string(),
            (_, Some(response)) => match &turn.execution {
                Some(execution) => format!(
                    "{response} [executed {} with status {}]",
                    describe_calls(turn.plan.as_ref()),
                    execution.status
                ),
                None => response.to_string(),
            },
            (_, None) => format!("(turn ended: {})", turn.outcome),
        };
        self.push(Message::assistant(summary));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn describe_calls(plan: Option<&Plan>) -> String {
    plan.map(|p| p.skill_names().join(", "))
        .unwrap_or_default()
}

/// One continuous interaction with the robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    turns: Vec<Turn>,
    context: ConversationContext,
    requires_operator_attention: bool,
}

impl Session {
    pub fn new(context_window: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            turns: Vec::new(),
            context: ConversationContext::new(context_window),
            requires_operator_attention: false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Record a finalized turn and feed it into the conversation context.
    pub fn record(&mut self, turn: Turn) {
        self.context.record(&turn);
        self.turns.push(turn);
    }

    pub fn requires_operator_attention(&self) -> bool {
        self.requires_operator_attention
    }

    pub fn flag_operator_attention(&mut self) {
        self.requires_operator_attention = true;
    }
}
