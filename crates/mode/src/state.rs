//! Orchestrator states and the transitions between them.

use std::sync::Arc;

use chrono::Utc;
use robovox_core::event::{DomainEvent, EventBus};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Where the orchestrator is in the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    Idle,
    /// Accumulating a transcript until end-of-utterance.
    Listening,
    /// Waiting on the planner.
    Planning,
    /// Waiting on the executor.
    Executing,
    /// Speaking the result.
    Responding,
    /// Speaking an error; always followed by `Idle`.
    Error,
}

impl ModeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Responding => "responding",
            Self::Error => "error",
        }
    }

    /// A turn is in flight and a new utterance counts as a barge-in.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Planning | Self::Executing | Self::Responding | Self::Error
        )
    }

    /// Whether `self → next` is part of the turn cycle.
    ///
    /// Any state may fall into `Error`. Busy states may jump back to
    /// `Listening` on barge-in.
    pub fn can_transition_to(&self, next: ModeState) -> bool {
        use ModeState::*;
        match (self, next) {
            (_, Error) => true,
            (Idle, Listening) => true,
            (Listening, Planning) | (Listening, Idle) => true,
            (Planning, Executing) | (Planning, Responding) => true,
            (Executing, Responding) => true,
            (Responding, Idle) | (Error, Idle) => true,
            (Planning | Executing | Responding | Error, Listening) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ModeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current [`ModeState`], observable through a watch channel.
pub struct ModeStateMachine {
    tx: watch::Sender<ModeState>,
    events: Option<Arc<EventBus>>,
}

impl ModeStateMachine {
    pub fn new(events: Option<Arc<EventBus>>) -> Self {
        let (tx, _) = watch::channel(ModeState::Idle);
        Self { tx, events }
    }

    pub fn current(&self) -> ModeState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModeState> {
        self.tx.subscribe()
    }

    /// Move to `next`. Staying put is a no-op; a move outside the cycle is
    /// logged and applied anyway so the observable state never lies.
    pub fn transition(&self, next: ModeState) {
        let from = self.current();
        if from == next {
            return;
        }
        if !from.can_transition_to(next) {
            warn!(%from, to = %next, "Unexpected mode transition");
        }
        self.tx.send_replace(next);
        debug!(%from, to = %next, "Mode changed");

        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::ModeChanged {
                from: from.to_string(),
                to: next.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ModeState::*;

    #[test]
    fn happy_paths_are_allowed() {
        let plan_path = [Idle, Listening, Planning, Executing, Responding, Idle];
        let reply_path = [Idle, Listening, Planning, Responding, Idle];
        for path in [&plan_path[..], &reply_path[..]] {
            for pair in path.windows(2) {
                assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn skipping_steps_is_not_allowed() {
        assert!(!Idle.can_transition_to(Planning));
        assert!(!Listening.can_transition_to(Executing));
        assert!(!Executing.can_transition_to(Idle));
        assert!(!Error.can_transition_to(Responding));
        assert!(!Idle.can_transition_to(Executing));
    }

    #[test]
    fn anything_can_fail_and_busy_states_can_be_interrupted() {
        for state in [Idle, Listening, Planning, Executing, Responding] {
            assert!(state.can_transition_to(Error));
        }
        for state in [Planning, Executing, Responding, Error] {
            assert!(state.is_busy());
            assert!(state.can_transition_to(Listening));
        }
        assert!(!Idle.is_busy() && !Listening.is_busy());
    }

    #[tokio::test]
    async fn transitions_are_published_and_watchable() {
        let bus = Arc::new(EventBus::new(16));
        let mut events = bus.subscribe();
        let machine = ModeStateMachine::new(Some(bus));
        let watcher = machine.subscribe();

        machine.transition(Listening);
        machine.transition(Listening);
        machine.transition(Planning);

        assert_eq!(*watcher.borrow(), Planning);
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::ModeChanged { from, to, .. } = event.as_ref() {
                seen.push(format!("{from}->{to}"));
            }
        }
        assert_eq!(seen, vec!["idle->listening", "listening->planning"]);
    }
}
