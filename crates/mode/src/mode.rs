//! The LLM mode: turn-taking over a transcript stream.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use robovox_agent::Planner;
use robovox_config::AppConfig;
use robovox_core::event::{DomainEvent, EventBus};
use robovox_core::session::{ActiveTurn, Session};
use robovox_core::speech::{PlaybackOutcome, SpeechOutput, TranscriptEvent};
use robovox_executor::SkillExecutor;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::state::{ModeState, ModeStateMachine};
use crate::turn::{TurnDeps, TurnReport};
use crate::wording::TRANSCRIPT_APOLOGY;

/// Why a session was closed.
pub mod end_reason {
    pub const IDLE: &str = "idle timeout";
    pub const SHUTDOWN: &str = "shutdown";
}

/// Every session the mode ran, oldest first. Sessions without turns are
/// left out.
#[derive(Debug, Default)]
pub struct ModeReport {
    pub sessions: Vec<Session>,
}

impl ModeReport {
    /// All turns across sessions, in order.
    pub fn turns(&self) -> impl Iterator<Item = &robovox_core::session::Turn> {
        self.sessions.iter().flat_map(|s| s.turns().iter())
    }
}

struct InflightTurn {
    id: String,
    cancel: CancellationToken,
    handle: JoinHandle<TurnReport>,
}

/// The transcript-error apology, played in the background so a new
/// utterance can cut it off.
struct InflightApology {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The top-level orchestrator.
///
/// Consumes transcript events, runs one turn at a time through the planner
/// and executor, and is the only caller of speech output. A new utterance
/// while a turn is in flight cancels that turn (barge-in); the cancelled
/// turn is finalized before the next one starts.
pub struct LlmMode {
    planner: Arc<dyn Planner>,
    executor: Arc<SkillExecutor>,
    speech: Arc<dyn SpeechOutput>,
    state: Arc<ModeStateMachine>,
    events: Option<Arc<EventBus>>,
    tts_enabled: bool,
    context_window: usize,
    idle_timeout: Duration,
}

impl LlmMode {
    pub fn new(
        planner: Arc<dyn Planner>,
        executor: Arc<SkillExecutor>,
        speech: Arc<dyn SpeechOutput>,
        config: &AppConfig,
    ) -> Self {
        Self {
            planner,
            executor,
            speech,
            state: Arc::new(ModeStateMachine::new(None)),
            events: None,
            tts_enabled: config.speech.tts_enabled,
            context_window: config.planner.context_window,
            idle_timeout: config.session.idle_timeout(),
        }
    }

    /// Publish mode, turn and session events on `bus`. Call before
    /// [`state`](Self::state): the state watch is rebuilt here.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.state = Arc::new(ModeStateMachine::new(Some(bus.clone())));
        self.events = Some(bus);
        self
    }

    /// Watch the current state.
    pub fn state(&self) -> watch::Receiver<ModeState> {
        self.state.subscribe()
    }

    /// Run until the transcript stream closes or `shutdown` fires.
    pub async fn run(
        self,
        mut transcripts: mpsc::Receiver<TranscriptEvent>,
        shutdown: CancellationToken,
    ) -> ModeReport {
        let mut report = ModeReport::default();
        let mut session = Session::new(self.context_window);
        let mut utterance = String::new();
        let mut inflight: Option<InflightTurn> = None;
        let mut apology: Option<InflightApology> = None;
        // Fault notice left over from a cancelled turn.
        let mut notice: Option<String> = None;
        let mut last_activity = Instant::now();
        let deps = Arc::new(TurnDeps {
            planner: self.planner.clone(),
            executor: self.executor.clone(),
            speech: self.speech.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
            tts_enabled: self.tts_enabled,
        });

        info!(session_id = %session.id, "LLM mode started");

        loop {
            let idle_armed = inflight.is_none()
                && apology.is_none()
                && utterance.is_empty()
                && !session.turns().is_empty()
                && self.state.current() == ModeState::Idle;

            tokio::select! {
                () = shutdown.cancelled() => break,

                joined = wait_for(&mut inflight), if inflight.is_some() => {
                    inflight = None;
                    notice = self.settle(joined, &mut session, &mut report);
                    last_activity = Instant::now();
                }

                () = wait_for_apology(&mut apology), if apology.is_some() => {
                    apology = None;
                    last_activity = Instant::now();
                }

                event = transcripts.recv() => {
                    let Some(event) = event else {
                        debug!("Transcript stream closed");
                        break;
                    };
                    last_activity = Instant::now();
                    match event {
                        TranscriptEvent::Fragment(text) => {
                            if let Some(turn) = inflight.take() {
                                notice = self.interrupt(turn, &mut session, &mut report).await;
                            }
                            if let Some(playing) = apology.take() {
                                stop_apology(playing).await;
                            }
                            if !utterance.is_empty() {
                                utterance.push(' ');
                            }
                            utterance.push_str(text.trim());
                            self.state.transition(ModeState::Listening);
                        }
                        TranscriptEvent::EndOfUtterance => {
                            let transcript = std::mem::take(&mut utterance);
                            let transcript = transcript.trim();
                            if transcript.is_empty() {
                                if self.state.current() == ModeState::Listening {
                                    self.state.transition(ModeState::Idle);
                                }
                                continue;
                            }
                            if let Some(turn) = inflight.take() {
                                notice = self.interrupt(turn, &mut session, &mut report).await;
                            }
                            if let Some(playing) = apology.take() {
                                stop_apology(playing).await;
                            }
                            inflight = Some(self.start_turn(&deps, transcript, &session, notice.take()));
                        }
                        TranscriptEvent::Error(message) => {
                            warn!(error = %message, "Speech input error");
                            utterance.clear();
                            self.publish(DomainEvent::ErrorOccurred {
                                context: "speech input".into(),
                                error_message: message,
                                timestamp: Utc::now(),
                            });
                            if inflight.is_none() {
                                if let Some(playing) = apology.take() {
                                    stop_apology(playing).await;
                                }
                                apology = Some(self.apologize(&deps, &shutdown));
                            }
                        }
                    }
                }

                () = tokio::time::sleep_until(last_activity + self.idle_timeout), if idle_armed => {
                    info!(session_id = %session.id, "Session idle, resetting");
                    self.end_session(&mut session, &mut report, end_reason::IDLE);
                }
            }
        }

        if let Some(playing) = apology.take() {
            stop_apology(playing).await;
        }
        if let Some(turn) = inflight.take() {
            notice = self.interrupt(turn, &mut session, &mut report).await;
        }
        if let Some(unspoken) = notice {
            warn!(notice = %unspoken, "Fault notice was never spoken");
        }
        self.state.transition(ModeState::Idle);
        self.end_session(&mut session, &mut report, end_reason::SHUTDOWN);
        info!(sessions = report.sessions.len(), "LLM mode stopped");
        report
    }

    fn start_turn(
        &self,
        deps: &Arc<TurnDeps>,
        transcript: &str,
        session: &Session,
        notice: Option<String>,
    ) -> InflightTurn {
        let turn = ActiveTurn::begin(transcript);
        let id = turn.id().to_string();
        info!(session_id = %session.id, turn_id = %id, transcript, "Turn started");

        self.state.transition(ModeState::Planning);
        let cancel = CancellationToken::new();
        let deps = deps.clone();
        let context = session.context().clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { deps.run(turn, context, token, notice).await });

        InflightTurn { id, cancel, handle }
    }

    /// Stop the in-flight turn (if it is still running) and record it.
    /// Returns the fault notice the turn did not get to say.
    async fn interrupt(
        &self,
        turn: InflightTurn,
        session: &mut Session,
        report: &mut ModeReport,
    ) -> Option<String> {
        if !turn.handle.is_finished() {
            info!(turn_id = %turn.id, state = %self.state.current(), "Barge-in, cancelling turn");
            self.publish(DomainEvent::BargeIn {
                cancelled_turn_id: turn.id.clone(),
                timestamp: Utc::now(),
            });
            turn.cancel.cancel();
        }
        let joined = turn.handle.await;
        self.settle(joined, session, report)
    }

    /// Record a finished turn and apply its session-level effects.
    /// Hands back a fault notice that still has to be spoken.
    fn settle(
        &self,
        joined: Result<TurnReport, JoinError>,
        session: &mut Session,
        report: &mut ModeReport,
    ) -> Option<String> {
        let TurnReport {
            turn,
            fatal,
            end_session,
            unspoken,
        } = match joined {
            Ok(turn_report) => turn_report,
            Err(e) => {
                error!(error = %e, "Turn task failed");
                self.publish(DomainEvent::ErrorOccurred {
                    context: "turn".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                self.state.transition(ModeState::Idle);
                return None;
            }
        };

        info!(
            session_id = %session.id,
            turn_id = %turn.id,
            outcome = %turn.outcome,
            "Turn finalized"
        );
        self.publish(DomainEvent::TurnFinalized {
            session_id: session.id.clone(),
            turn: Box::new(turn.clone()),
        });
        session.record(turn);

        if let Some(reason) = fatal {
            session.flag_operator_attention();
            warn!(session_id = %session.id, %reason, "Operator attention required");
            self.publish(DomainEvent::OperatorAttentionRequired {
                session_id: session.id.clone(),
                reason,
                timestamp: Utc::now(),
            });
        }
        if let Some(reason) = end_session {
            self.end_session(session, report, &reason);
        }
        if unspoken.is_some() {
            debug!(session_id = %session.id, "Fault notice carried to the next turn");
        }
        unspoken
    }

    /// Close `session` and start a fresh one in its place.
    fn end_session(&self, session: &mut Session, report: &mut ModeReport, reason: &str) {
        let finished = std::mem::replace(session, Session::new(self.context_window));
        if finished.turns().is_empty() {
            return;
        }
        info!(session_id = %finished.id, turns = finished.turns().len(), reason, "Session ended");
        self.publish(DomainEvent::SessionEnded {
            session_id: finished.id.clone(),
            turns: finished.turns().len(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        report.sessions.push(finished);
    }

    /// Enter `Error` and start the apology. The task moves back to `Idle`
    /// only if the apology plays to the end.
    fn apologize(&self, deps: &Arc<TurnDeps>, shutdown: &CancellationToken) -> InflightApology {
        self.state.transition(ModeState::Error);
        let cancel = shutdown.child_token();
        let token = cancel.clone();
        let deps = deps.clone();
        let handle = tokio::spawn(async move {
            if deps.speak(TRANSCRIPT_APOLOGY, &token).await == PlaybackOutcome::Completed {
                deps.state.transition(ModeState::Idle);
            }
        });
        InflightApology { cancel, handle }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

async fn wait_for(inflight: &mut Option<InflightTurn>) -> Result<TurnReport, JoinError> {
    match inflight {
        Some(turn) => (&mut turn.handle).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_apology(apology: &mut Option<InflightApology>) {
    match apology {
        Some(playing) => {
            if let Err(e) = (&mut playing.handle).await {
                error!(error = %e, "Apology task failed");
            }
        }
        None => std::future::pending().await,
    }
}

/// Cut the apology off and wait until the speaker is released.
async fn stop_apology(apology: InflightApology) {
    apology.cancel.cancel();
    if let Err(e) = apology.handle.await {
        error!(error = %e, "Apology task failed");
    }
}
