//! Console speech output: "speaks" by printing words at a speaking pace.

use std::io::{self, Stdout, Write};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use robovox_config::SpeechConfig;
use robovox_core::error::SpeechError;
use robovox_core::speech::{PlaybackOutcome, SpeechOutput};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Prints responses word by word, paced like speech, so barge-in behaves the
/// way it would with a real TTS engine.
pub struct ConsoleSpeechOutput<W: Write + Send = Stdout> {
    out: Mutex<W>,
    per_word: Duration,
    prefix: String,
}

impl ConsoleSpeechOutput<Stdout> {
    pub fn stdout(config: &SpeechConfig) -> Self {
        Self::with_writer(io::stdout(), config.words_per_minute)
    }
}

impl<W: Write + Send> ConsoleSpeechOutput<W> {
    /// `words_per_minute == 0` prints everything at once.
    pub fn with_writer(out: W, words_per_minute: u32) -> Self {
        let per_word = match words_per_minute {
            0 => Duration::ZERO,
            wpm => Duration::from_secs(60) / wpm,
        };
        Self {
            out: Mutex::new(out),
            per_word,
            prefix: "🤖 ".into(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn per_word(&self) -> Duration {
        self.per_word
    }

    /// Hand back the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, text: &str) -> Result<(), SpeechError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| SpeechError::Playback("console writer poisoned".into()))?;
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| SpeechError::Playback(e.to_string()))
    }
}

#[async_trait]
impl<W: Write + Send> SpeechOutput for ConsoleSpeechOutput<W> {
    fn name(&self) -> &str {
        "console"
    }

    async fn speak(&self, text: &str, cancel: CancellationToken) -> Result<PlaybackOutcome, SpeechError> {
        self.write(&self.prefix)?;
        for (i, word) in text.split_whitespace().enumerate() {
            if i > 0 {
                self.write(" ")?;
            }
            self.write(word)?;

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.write(" …\n")?;
                    debug!(spoken_words = i + 1, "Playback interrupted");
                    return Ok(PlaybackOutcome::Interrupted);
                }
                () = tokio::time::sleep(self.per_word) => {}
            }
        }
        self.write("\n")?;
        Ok(PlaybackOutcome::Completed)
    }
}
