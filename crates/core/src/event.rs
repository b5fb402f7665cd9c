//! Domain event system: decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens in the system.
//! Persistence and audit consumers subscribe here; the core never writes
//! records anywhere itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::FailureClass;
use crate::plan::ExecutionStatus;
use crate::session::Turn;
use crate::skill::SkillStatus;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The orchestrator moved between states
    ModeChanged {
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn was finalized; carries the full record
    TurnFinalized {
        session_id: String,
        turn: Box<Turn>,
    },

    /// A skill call finished
    SkillExecuted {
        call_id: String,
        skill: String,
        status: SkillStatus,
        failure: Option<FailureClass>,
        attempts: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A plan finished running
    PlanExecuted {
        plan_id: String,
        status: ExecutionStatus,
        calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// The planner proposed something the registry does not accept
    PlanRejected {
        turn_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A new utterance interrupted an in-flight turn
    BargeIn {
        cancelled_turn_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A fatal hardware failure needs a human
    OperatorAttentionRequired {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A session ended (explicitly or after silence)
    SessionEnded {
        session_id: String,
        turns: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ActiveTurn, TurnOutcome};

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::SkillExecuted {
            call_id: "c1".into(),
            skill: "stop".into(),
            status: SkillStatus::Ok,
            failure: None,
            attempts: 1,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::SkillExecuted { skill, status, .. } => {
                assert_eq!(skill, "stop");
                assert_eq!(*status, SkillStatus::Ok);
            }
            _ => panic!("Expected SkillExecuted event"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "nobody listening".into(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn turn_record_serializes() {
        let turn = ActiveTurn::begin("stop").finalize(TurnOutcome::Cancelled);
        let event = DomainEvent::TurnFinalized {
            session_id: "s1".into(),
            turn: Box::new(turn),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("cancelled"));
        assert!(json.contains("\"transcript\":\"stop\""));
    }
}
