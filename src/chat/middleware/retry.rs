use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::chat::{AssistantMessage, ChatClient, CompletionOptions, Message};
use crate::error::CoreError;

/// Retries the inner client on retryable failures with exponential backoff
/// from 1s up to 10s (spec.md §4.6), stopping immediately on
/// `QuotaExhausted` since no amount of retrying fixes an exhausted quota.
pub struct RetryingChatClient {
    inner: Arc<dyn ChatClient>,
    max_retries: u32,
}

impl RetryingChatClient {
    pub fn new(inner: Arc<dyn ChatClient>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl ChatClient for RetryingChatClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<AssistantMessage, CoreError> {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 0;
        loop {
            match self.inner.complete(messages, options).await {
                Ok(message) => return Ok(message),
                Err(err) if matches!(err, CoreError::QuotaExhausted(_)) => return Err(err),
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    warn!(attempt, error = %err, "chat backend call failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(10));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
