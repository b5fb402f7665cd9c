//! Retry decorator: bounded exponential backoff around a single provider.
//!
//! Each attempt gets its own timeout. Transport failures (timeouts, network
//! errors, rate limits, 5xx) are retried after `base * 2^n`; anything else is
//! returned immediately.

use async_trait::async_trait;
use robovox_core::error::ProviderError;
use robovox_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A provider that retries transport failures of an inner provider.
pub struct RetryProvider {
    inner: Arc<dyn robovox_core::Provider>,
    attempt_timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl RetryProvider {
    /// Wrap a provider with the default policy: 10s per attempt, 2 retries
    /// at 1s then 2s.
    pub fn new(inner: Arc<dyn robovox_core::Provider>) -> Self {
        Self {
            inner,
            attempt_timeout: Duration::from_secs(10),
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[async_trait]
impl robovox_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut retry = 0;
        loop {
            let attempt = retry + 1;
            let outcome =
                match tokio::time::timeout(self.attempt_timeout, self.inner.complete(request.clone()))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}ms",
                        self.inner.name(),
                        self.attempt_timeout.as_millis()
                    ))),
                };

            match outcome {
                Ok(response) => {
                    if retry > 0 {
                        info!(provider = %self.inner.name(), attempt, "Provider recovered after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    let delay = self.backoff(retry);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Provider request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    warn!(provider = %self.inner.name(), attempt, error = %e, "Provider request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robovox_core::Provider;
    use robovox_core::message::Message;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays back a fixed sequence of outcomes; `None` hangs forever.
    struct SequenceProvider {
        outcomes: Mutex<VecDeque<Option<std::result::Result<String, ProviderError>>>>,
        call_count: Mutex<usize>,
    }

    impl SequenceProvider {
        fn new(outcomes: Vec<Option<std::result::Result<String, ProviderError>>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl robovox_core::Provider for SequenceProvider {
        fn name(&self) -> &str {
            "sequence"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            let next = self.outcomes.lock().unwrap().pop_front();
            match next {
                Some(Some(Ok(text))) => Ok(ProviderResponse {
                    message: Message::assistant(text),
                    usage: None,
                    model: "test-model".into(),
                }),
                Some(Some(Err(e))) => Err(e),
                Some(None) => std::future::pending().await,
                None => Err(ProviderError::NotConfigured("script exhausted".into())),
            }
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "m".into(),
            messages: vec![Message::user("status")],
            temperature: 0.2,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_timeouts_then_success() {
        let inner = Arc::new(SequenceProvider::new(vec![None, None, Some(Ok("ok".into()))]));
        let provider = RetryProvider::new(inner.clone());

        let start = tokio::time::Instant::now();
        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.message.content, "ok");
        assert_eq!(inner.calls(), 3);
        // 10s + 1s backoff + 10s + 2s backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(23));
        assert!(elapsed < Duration::from_secs(24));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let inner = Arc::new(SequenceProvider::new(vec![
            Some(Err(ProviderError::Network("refused".into()))),
            Some(Err(ProviderError::Network("refused".into()))),
            Some(Err(ProviderError::Network("refused".into()))),
            Some(Ok("too late".into())),
        ]));
        let provider = RetryProvider::new(inner.clone());

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_not_retried() {
        let inner = Arc::new(SequenceProvider::new(vec![
            Some(Err(ProviderError::MalformedResponse("not json".into()))),
            Some(Ok("unused".into())),
        ]));
        let provider = RetryProvider::new(inner.clone());

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn backoff_doubles() {
        let inner = Arc::new(SequenceProvider::new(vec![]));
        let provider = RetryProvider::new(inner).with_backoff_base(Duration::from_millis(500));
        assert_eq!(provider.backoff(0), Duration::from_millis(500));
        assert_eq!(provider.backoff(1), Duration::from_millis(1000));
        assert_eq!(provider.backoff(2), Duration::from_millis(2000));
        assert_eq!(provider.name(), "sequence");
    }
}
