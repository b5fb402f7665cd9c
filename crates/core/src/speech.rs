//! Speech boundaries.
//!
//! Speech-to-text and text-to-speech engines live outside this workspace; the
//! orchestrator only sees a stream of transcript events and a cancellable
//! "say this" call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SpeechError;

/// One event from the speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// Partial text of the utterance in progress.
    Fragment(String),
    /// The speaker finished; the fragments so far form one utterance.
    EndOfUtterance,
    /// Recognition failed for the current utterance.
    Error(String),
}

/// How a playback call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    Completed,
    Interrupted,
}

/// A restartable source of transcript events.
#[async_trait]
pub trait SpeechInput: Send + Sync {
    fn name(&self) -> &str;

    /// Start (or restart) recognition. Events arrive on the returned channel
    /// until the input closes.
    async fn start(&self) -> Result<mpsc::Receiver<TranscriptEvent>, SpeechError>;
}

/// Text-to-speech playback.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    fn name(&self) -> &str;

    /// Speak `text`. Must return promptly with [`PlaybackOutcome::Interrupted`]
    /// once `cancel` fires.
    async fn speak(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<PlaybackOutcome, SpeechError>;
}
