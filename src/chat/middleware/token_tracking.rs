use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chat::{AssistantMessage, ChatClient, CompletionOptions, Message};
use crate::error::CoreError;

/// Accumulates prompt/completion token counts across every call made
/// through this client, so an Orchestrator can report total token spend
/// alongside a `Report` without each backend having to track it itself.
pub struct TokenTrackingChatClient {
    inner: Arc<dyn ChatClient>,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl TokenTrackingChatClient {
    pub fn new(inner: Arc<dyn ChatClient>) -> Self {
        Self {
            inner,
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.load(Ordering::Relaxed) + self.completion_tokens.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatClient for TokenTrackingChatClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<AssistantMessage, CoreError> {
        let message = self.inner.complete(messages, options).await?;
        self.prompt_tokens.fetch_add(message.usage.prompt_tokens as u64, Ordering::Relaxed);
        self.completion_tokens.fetch_add(message.usage.completion_tokens as u64, Ordering::Relaxed);
        debug!(total = self.total_tokens(), "chat token usage updated");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::TokenUsage;

    struct FixedUsageClient;

    #[async_trait]
    impl ChatClient for FixedUsageClient {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _messages: &[Message], _options: &CompletionOptions) -> Result<AssistantMessage, CoreError> {
            Ok(AssistantMessage {
                content: "ok".into(),
                tool_calls: vec![],
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                },
            })
        }
    }

    #[tokio::test]
    async fn accumulates_tokens_across_calls() {
        let tracker = TokenTrackingChatClient::new(Arc::new(FixedUsageClient));
        tracker.complete(&[], &CompletionOptions::default()).await.unwrap();
        tracker.complete(&[], &CompletionOptions::default()).await.unwrap();
        assert_eq!(tracker.total_tokens(), 30);
    }
}
