//! Line-based speech input: every typed line is one utterance.
//!
//! A line ending in `...` is sent as a fragment without ending the
//! utterance, so a long request can be typed in pieces. A line starting with
//! `!error` simulates a recognizer failure.

use std::sync::Mutex;

use async_trait::async_trait;
use robovox_core::error::SpeechError;
use robovox_core::speech::{SpeechInput, TranscriptEvent};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Reader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Transcript events from lines of text.
pub struct LineSpeechInput {
    reader: Mutex<Option<Reader>>,
}

impl LineSpeechInput {
    pub fn new(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
        }
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

/// What one input line turns into. `None` ends the input.
fn events_for(line: &str) -> Option<Vec<TranscriptEvent>> {
    let line = line.trim();
    if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
        return None;
    }
    if line.is_empty() {
        return Some(Vec::new());
    }
    if let Some(message) = line.strip_prefix("!error") {
        let message = message.trim();
        let message = if message.is_empty() { "recognition failed" } else { message };
        return Some(vec![TranscriptEvent::Error(message.to_string())]);
    }
    if let Some(fragment) = line.strip_suffix("...") {
        return Some(vec![TranscriptEvent::Fragment(fragment.trim().to_string())]);
    }
    Some(vec![
        TranscriptEvent::Fragment(line.to_string()),
        TranscriptEvent::EndOfUtterance,
    ])
}

#[async_trait]
impl SpeechInput for LineSpeechInput {
    fn name(&self) -> &str {
        "lines"
    }

    /// The underlying reader can only be consumed once; a second start
    /// reports the input as closed.
    async fn start(&self) -> Result<mpsc::Receiver<TranscriptEvent>, SpeechError> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| SpeechError::InputClosed)?
            .take()
            .ok_or(SpeechError::InputClosed)?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(events) = events_for(&line) else {
                            debug!("Exit requested on speech input");
                            break;
                        };
                        for event in events {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        warn!(error = %e, "Speech input read failed");
                        let _ = tx.send(TranscriptEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}
