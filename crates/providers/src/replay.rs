//! Replay provider: answers from a table of recorded exchanges.
//!
//! Each entry maps an utterance (matched case-insensitively, ignoring
//! trailing punctuation) to a recorded response: plain text, a list of tool
//! calls, or a transport error. Several entries for the same utterance play
//! back in order; the last one repeats.
//!
//! ```json
//! [
//!   { "utterance": "move forward then stop",
//!     "type": "tool_calls",
//!     "calls": [ { "name": "move_to", "arguments": { "direction": "forward" } },
//!                { "name": "stop" } ] },
//!   { "utterance": "what's your status", "type": "reply", "text": "All joints nominal." }
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use robovox_core::error::ProviderError;
use robovox_core::message::{Message, MessageToolCall};
use robovox_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A recorded LLM response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recorded {
    Reply { text: String },
    ToolCalls { calls: Vec<RecordedCall> },
    Error { kind: RecordedErrorKind, message: String },
    /// Raw assistant tool calls whose arguments are kept verbatim (may be invalid JSON).
    RawToolCalls { calls: Vec<MessageToolCall> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedErrorKind {
    Timeout,
    Network,
    Malformed,
    Server,
}

/// One recorded exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEntry {
    pub utterance: String,
    #[serde(flatten)]
    pub response: Recorded,
    /// Simulated service latency.
    #[serde(default)]
    pub delay_ms: u64,
}

impl ReplayEntry {
    pub fn reply(utterance: &str, text: &str) -> Self {
        Self {
            utterance: utterance.into(),
            response: Recorded::Reply { text: text.into() },
            delay_ms: 0,
        }
    }

    pub fn tool_calls(utterance: &str, calls: Vec<(&str, serde_json::Value)>) -> Self {
        let calls = calls
            .into_iter()
            .map(|(name, args)| RecordedCall {
                name: name.into(),
                arguments: args.as_object().cloned().unwrap_or_default(),
            })
            .collect();
        Self {
            utterance: utterance.into(),
            response: Recorded::ToolCalls { calls },
            delay_ms: 0,
        }
    }

    pub fn error(utterance: &str, kind: RecordedErrorKind) -> Self {
        Self {
            utterance: utterance.into(),
            response: Recorded::Error {
                kind,
                message: "recorded failure".into(),
            },
            delay_ms: 0,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }
}

/// A provider that replays recorded exchanges.
pub struct ReplayProvider {
    table: HashMap<String, Vec<ReplayEntry>>,
    cursors: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ReplayProvider {
    pub fn new(entries: Vec<ReplayEntry>) -> Self {
        let mut table: HashMap<String, Vec<ReplayEntry>> = HashMap::new();
        for entry in entries {
            table.entry(normalize(&entry.utterance)).or_default().push(entry);
        }
        Self {
            table,
            cursors: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Parse a JSON array of entries.
    pub fn from_json(json: &str) -> std::result::Result<Self, ProviderError> {
        let entries: Vec<ReplayEntry> = serde_json::from_str(json)
            .map_err(|e| ProviderError::NotConfigured(format!("invalid replay table: {e}")))?;
        Ok(Self::new(entries))
    }

    pub fn from_file(path: &Path) -> std::result::Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::NotConfigured(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Number of distinct utterances recorded.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn next_entry(&self, key: &str) -> Option<ReplayEntry> {
        let entries = self.table.get(key)?;
        let mut cursors = self.cursors.lock().ok()?;
        let cursor = cursors.entry(key.to_string()).or_insert(0);
        let entry = entries.get(*cursor).or_else(|| entries.last())?.clone();
        *cursor += 1;
        Some(entry)
    }
}

fn normalize(utterance: &str) -> String {
    utterance
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

#[async_trait]
impl robovox_core::Provider for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let utterance = request.last_user_text().unwrap_or_default();
        let key = normalize(utterance);
        let entry = self
            .next_entry(&key)
            .ok_or_else(|| ProviderError::NotConfigured(format!("no recording for '{utterance}'")))?;

        debug!(utterance = %key, delay_ms = entry.delay_ms, "Replaying recorded response");
        if entry.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(entry.delay_ms)).await;
        }

        let message = match entry.response {
            Recorded::Reply { text } => Message::assistant(text),
            Recorded::ToolCalls { calls } => Message::tool_calls(
                calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, call)| MessageToolCall {
                        id: format!("call_{}", i + 1),
                        name: call.name,
                        arguments: serde_json::Value::Object(call.arguments).to_string(),
                    })
                    .collect(),
            ),
            Recorded::RawToolCalls { calls } => Message::tool_calls(calls),
            Recorded::Error { kind, message } => {
                return Err(match kind {
                    RecordedErrorKind::Timeout => ProviderError::Timeout(message),
                    RecordedErrorKind::Network => ProviderError::Network(message),
                    RecordedErrorKind::Malformed => ProviderError::MalformedResponse(message),
                    RecordedErrorKind::Server => ProviderError::ApiError {
                        status_code: 503,
                        message,
                    },
                });
            }
        };

        Ok(ProviderResponse {
            message,
            usage: None,
            model: "replay".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robovox_core::Provider;

    fn request(text: &str) -> ProviderRequest {
        ProviderRequest {
            model: "m".into(),
            messages: vec![Message::system("prompt"), Message::user(text)],
            temperature: 0.2,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn replays_tool_calls() {
        let provider = ReplayProvider::new(vec![ReplayEntry::tool_calls(
            "move forward then stop",
            vec![
                ("move_to", serde_json::json!({"direction": "forward"})),
                ("stop", serde_json::json!({})),
            ],
        )]);

        let response = provider.complete(request("Move forward then stop.")).await.unwrap();
        let calls = &response.message.tool_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "move_to");
        assert_eq!(calls[0].arguments, r#"{"direction":"forward"}"#);
        assert_eq!(calls[1].arguments, "{}");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn repeated_utterance_plays_in_order_then_repeats_last() {
        let provider = ReplayProvider::new(vec![
            ReplayEntry::error("status", RecordedErrorKind::Timeout),
            ReplayEntry::reply("status", "fine"),
        ]);

        assert!(matches!(
            provider.complete(request("status")).await,
            Err(ProviderError::Timeout(_))
        ));
        assert_eq!(provider.complete(request("status")).await.unwrap().message.content, "fine");
        assert_eq!(provider.complete(request("status")).await.unwrap().message.content, "fine");
    }

    #[tokio::test]
    async fn unknown_utterance_is_not_configured() {
        let provider = ReplayProvider::new(vec![]);
        assert!(matches!(
            provider.complete(request("dance")).await,
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn parses_json_table() {
        let json = r#"[
            {"utterance": "move forward then stop", "type": "tool_calls",
             "calls": [{"name": "move_to", "arguments": {"direction": "forward"}}, {"name": "stop"}]},
            {"utterance": "what's your status", "type": "reply", "text": "All joints nominal.", "delay_ms": 5}
        ]"#;
        let provider = ReplayProvider::from_json(json).unwrap();
        assert_eq!(provider.len(), 2);
        assert!(ReplayProvider::from_json("{").is_err());
    }
}
