//! One turn: plan, execute, respond.

use std::sync::Arc;

use chrono::Utc;
use robovox_agent::Planner;
use robovox_core::error::PlanningError;
use robovox_core::event::{DomainEvent, EventBus};
use robovox_core::plan::{ExecutionResult, ExecutionStatus, PlanOrReply};
use robovox_core::session::{ActiveTurn, ConversationContext, Turn, TurnOutcome};
use robovox_core::speech::{PlaybackOutcome, SpeechOutput};
use robovox_executor::SkillExecutor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::state::{ModeState, ModeStateMachine};
use crate::wording::{clean_for_speech, execution_summary, fault_notice, planning_failure};

/// Everything a turn task needs, shared across turns.
pub(crate) struct TurnDeps {
    pub planner: Arc<dyn Planner>,
    pub executor: Arc<SkillExecutor>,
    pub speech: Arc<dyn SpeechOutput>,
    pub state: Arc<ModeStateMachine>,
    pub events: Option<Arc<EventBus>>,
    pub tts_enabled: bool,
}

/// What a finished turn hands back to the mode loop.
#[derive(Debug)]
pub(crate) struct TurnReport {
    pub turn: Turn,
    /// Set when a fatal hardware failure ended the turn.
    pub fatal: Option<String>,
    /// Set when the plan ran `end_session` successfully.
    pub end_session: Option<String>,
    /// A fault notice nobody heard yet. The next turn says it first.
    pub unspoken: Option<String>,
}

impl TurnReport {
    fn new(turn: Turn) -> Self {
        Self {
            turn,
            fatal: None,
            end_session: None,
            unspoken: None,
        }
    }
}

impl TurnDeps {
    /// Run one turn to its finalized record. State moves through
    /// `Planning → (Executing →) Responding → Idle`, or `Error → Idle`.
    /// A cancelled turn returns without touching the state; the mode loop
    /// owns the transition out of a barge-in.
    ///
    /// `notice` is spoken ahead of whatever this turn says. If the turn
    /// ends up cancelled it comes back in [`TurnReport::unspoken`] together
    /// with any fault this turn raised itself.
    pub(crate) async fn run(
        &self,
        turn: ActiveTurn,
        context: ConversationContext,
        cancel: CancellationToken,
        notice: Option<String>,
    ) -> TurnReport {
        let mut report = self.play(turn, context, &cancel, notice.as_deref()).await;
        let raised = report.unspoken.take();
        if report.turn.outcome == TurnOutcome::Cancelled {
            report.unspoken = match (notice, raised) {
                (Some(old), Some(new)) if old != new => Some(format!("{old} {new}")),
                (old, new) => new.or(old),
            };
        }
        report
    }

    async fn play(
        &self,
        mut turn: ActiveTurn,
        context: ConversationContext,
        cancel: &CancellationToken,
        notice: Option<&str>,
    ) -> TurnReport {
        let schema = self.executor.host().schema();
        let planned = self
            .planner
            .plan(turn.transcript(), &context, schema, cancel)
            .await;

        let plan = match planned {
            Err(PlanningError::Cancelled) => {
                debug!(turn_id = %turn.id(), "Turn cancelled while planning");
                return TurnReport::new(turn.finalize(TurnOutcome::Cancelled));
            }
            Err(e) => {
                if let PlanningError::Validation(reason) = &e {
                    self.publish(DomainEvent::PlanRejected {
                        turn_id: turn.id().to_string(),
                        reason: reason.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                turn.set_error(e.to_string());
                let text = prefixed(notice, &planning_failure(&e));
                return TurnReport::new(self.fail(turn, &text, cancel).await);
            }
            Ok(PlanOrReply::Reply(text)) => {
                self.state.transition(ModeState::Responding);
                let text = prefixed(notice, &text);
                let turn = self.respond(turn, &text, TurnOutcome::Replied, cancel).await;
                return TurnReport::new(turn);
            }
            Ok(PlanOrReply::Plan(plan)) => plan,
        };

        if cancel.is_cancelled() {
            return TurnReport::new(turn.finalize(TurnOutcome::Cancelled));
        }

        info!(turn_id = %turn.id(), plan_id = %plan.id, skills = ?plan.skill_names(), "Executing plan");
        turn.set_plan(plan.clone());
        self.state.transition(ModeState::Executing);
        let result = self.executor.execute(&plan, cancel).await;

        let text = execution_summary(&result);
        let end_session = end_session_reason(&result);
        let status = result.status;
        let fatal = result.fatal.then(|| fatal_reason(&result));
        let fault = fault_notice(&result);
        turn.set_execution(result);

        if let Some(reason) = &fatal {
            error!(turn_id = %turn.id(), %reason, "Fatal hardware failure ended the turn");
            turn.set_error(reason.clone());
        }

        if status == ExecutionStatus::Cancelled {
            info!(turn_id = %turn.id(), fatal = fatal.is_some(), "Plan cancelled by barge-in");
            let mut report = TurnReport::new(turn.finalize(TurnOutcome::Cancelled));
            report.fatal = fatal;
            report.unspoken = fault;
            return report;
        }

        if fatal.is_some() {
            let text = prefixed(notice, &text);
            let mut report = TurnReport::new(self.fail(turn, &text, cancel).await);
            report.fatal = fatal;
            report.unspoken = fault;
            return report;
        }

        self.state.transition(ModeState::Responding);
        let text = prefixed(notice, end_session.as_deref().unwrap_or(text.as_str()));
        let mut report = TurnReport::new(
            self.respond(turn, &text, TurnOutcome::Completed, cancel)
                .await,
        );
        report.end_session = end_session;
        report
    }

    async fn respond(
        &self,
        mut turn: ActiveTurn,
        text: &str,
        outcome: TurnOutcome,
        cancel: &CancellationToken,
    ) -> Turn {
        turn.set_response(text);
        match self.speak(text, cancel).await {
            PlaybackOutcome::Completed => {
                self.state.transition(ModeState::Idle);
                turn.finalize(outcome)
            }
            PlaybackOutcome::Interrupted => turn.finalize(TurnOutcome::Cancelled),
        }
    }

    /// Speak an error and return to `Idle`.
    async fn fail(&self, mut turn: ActiveTurn, text: &str, cancel: &CancellationToken) -> Turn {
        self.state.transition(ModeState::Error);
        turn.set_response(text);
        match self.speak(text, cancel).await {
            PlaybackOutcome::Completed => {
                self.state.transition(ModeState::Idle);
                turn.finalize(TurnOutcome::Error)
            }
            PlaybackOutcome::Interrupted => turn.finalize(TurnOutcome::Cancelled),
        }
    }

    pub(crate) async fn speak(&self, text: &str, cancel: &CancellationToken) -> PlaybackOutcome {
        if cancel.is_cancelled() {
            return PlaybackOutcome::Interrupted;
        }
        let cleaned = clean_for_speech(text);
        if cleaned.is_empty() {
            return PlaybackOutcome::Completed;
        }
        if !self.tts_enabled {
            info!(response = %cleaned, "Speech output disabled");
            return PlaybackOutcome::Completed;
        }

        match self.speech.speak(&cleaned, cancel.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(output = %self.speech.name(), error = %e, "Speech output failed");
                if cancel.is_cancelled() {
                    PlaybackOutcome::Interrupted
                } else {
                    PlaybackOutcome::Completed
                }
            }
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

fn prefixed(notice: Option<&str>, text: &str) -> String {
    match notice {
        Some(notice) if !text.is_empty() => format!("{notice} {text}"),
        Some(notice) => notice.to_string(),
        None => text.to_string(),
    }
}

/// The reason passed to a successful `end_session` call.
fn end_session_reason(result: &ExecutionResult) -> Option<String> {
    result
        .results
        .iter()
        .filter(|r| r.is_ok() && r.skill == "end_session")
        .find_map(|r| {
            r.payload
                .as_ref()
                .and_then(|p| p.get("reason"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
}

fn fatal_reason(result: &ExecutionResult) -> String {
    result
        .results
        .iter()
        .find(|r| r.is_fatal())
        .and_then(|r| {
            r.error
                .as_ref()
                .map(|e| format!("{}: {}", r.skill, e.message))
        })
        .unwrap_or_else(|| "fatal hardware failure".into())
}
