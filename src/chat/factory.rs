//! Backend selection policy (spec.md §4.6, §9): premium when an API key is
//! configured, free otherwise. Wraps whichever backend is chosen in the
//! retry and token-tracking middleware chain so callers always talk to a
//! single `Arc<dyn ChatClient>`.

use std::sync::Arc;

use super::backend::{FreeChatBackend, PremiumChatBackend};
use super::middleware::{RetryingChatClient, TokenTrackingChatClient};
use super::ChatClient;

#[derive(Debug, Clone)]
pub struct ChatBackendSettings {
    pub premium_api_key: Option<String>,
    pub premium_model: String,
    pub free_model: String,
    pub free_api_token: Option<String>,
    pub max_retries: u32,
}

impl Default for ChatBackendSettings {
    fn default() -> Self {
        Self {
            premium_api_key: None,
            premium_model: "gpt-4o-mini".to_string(),
            free_model: "HuggingFaceH4/zephyr-7b-beta".to_string(),
            free_api_token: None,
            max_retries: 3,
        }
    }
}

/// Builds the chat client this request will use, applying the backend
/// selection policy and wrapping it in the retry/token-tracking
/// interceptor chain (spec.md §9: middleware composes around a base
/// client, outermost first).
pub fn build_chat_client(settings: &ChatBackendSettings) -> Arc<dyn ChatClient> {
    let inner: Arc<dyn ChatClient> = match &settings.premium_api_key {
        Some(key) if !key.trim().is_empty() => {
            Arc::new(PremiumChatBackend::new(key.clone(), settings.premium_model.clone()))
        }
        _ => Arc::new(FreeChatBackend::new(settings.free_model.clone(), settings.free_api_token.clone())),
    };

    let retrying = Arc::new(RetryingChatClient::new(inner, settings.max_retries));
    Arc::new(TokenTrackingChatClient::new(retrying))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_free_backend_when_no_api_key_configured() {
        let settings = ChatBackendSettings::default();
        let client = build_chat_client(&settings);
        assert_eq!(client.name(), "free");
    }

    #[test]
    fn selects_premium_backend_when_api_key_configured() {
        let settings = ChatBackendSettings {
            premium_api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let client = build_chat_client(&settings);
        assert_eq!(client.name(), "premium");
    }
}
