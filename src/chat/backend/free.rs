use std::borrow::Cow;
use std::sync::OnceLock;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chat::{AssistantMessage, ChatClient, CompletionOptions, Message, TokenUsage};
use crate::error::CoreError;

const DEFAULT_BASE: &str = "https://api-inference.huggingface.co/models";
const BASE_ENV: &str = "LITLOOP_FREE_CHAT_BASE_URL";

fn http_client() -> &'static ClientWithMiddleware {
    static CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();
    CLIENT.get_or_init(|| {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    })
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Serialize)]
struct GenerationParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GenerationResponseItem {
    generated_text: String,
}

/// Chat backend against a Hugging-Face-Inference-shaped text-generation
/// endpoint. Free-tier fallback in spec.md §4.6's backend selection policy:
/// no tool-calling support (tool descriptors are folded into the prompt as
/// plain text, matching the JSON-schema-in-prompt pattern other backends in
/// this family use when the model has no native function-calling API), and
/// no token accounting from the server (reported usage is always zero).
pub struct FreeChatBackend {
    base_url: Cow<'static, str>,
    api_token: Option<String>,
    model: String,
}

impl FreeChatBackend {
    pub fn new(model: impl Into<String>, api_token: Option<String>) -> Self {
        let base_url = match std::env::var(BASE_ENV) {
            Ok(v) if !v.trim().is_empty() => Cow::Owned(v),
            _ => Cow::Borrowed(DEFAULT_BASE),
        };
        Self {
            base_url,
            api_token,
            model: model.into(),
        }
    }

    #[cfg(test)]
    fn new_for_test(base_url: String) -> Self {
        Self {
            base_url: Cow::Owned(base_url),
            api_token: None,
            model: "test-model".into(),
        }
    }

    fn render_prompt(&self, messages: &[Message], options: &CompletionOptions) -> String {
        let mut prompt = String::new();
        for message in messages {
            prompt.push_str(&format!("{:?}: {}\n", message.role, message.content));
        }
        if let Some(schema) = &options.json_schema {
            prompt.push_str(&format!(
                "\nRespond with ONLY valid JSON matching this schema:\n{}\n",
                json!(schema)
            ));
        }
        prompt
    }
}

#[async_trait]
impl ChatClient for FreeChatBackend {
    fn name(&self) -> &str {
        "free"
    }

    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<AssistantMessage, CoreError> {
        let prompt = self.render_prompt(messages, options);
        let url = format!("{}/{}", self.base_url, self.model);

        let mut request_builder = http_client().post(url).json(&GenerationRequest {
            inputs: &prompt,
            parameters: GenerationParameters {
                temperature: options.temperature,
                max_new_tokens: options.max_tokens,
                return_full_text: false,
            },
        });
        if let Some(token) = &self.api_token {
            request_builder = request_builder.bearer_auth(token);
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| CoreError::BackendUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::QuotaExhausted("free backend rate limit reached".into()));
        }
        if !response.status().is_success() {
            return Err(CoreError::BackendUnavailable(format!(
                "free backend returned status {}",
                response.status()
            )));
        }

        let body: Vec<GenerationResponseItem> = response
            .json()
            .await
            .map_err(|e| CoreError::BackendUnavailable(e.to_string()))?;

        let content = body
            .into_iter()
            .next()
            .map(|item| item.generated_text)
            .ok_or_else(|| CoreError::BackendUnavailable("empty generation response".into()))?;

        Ok(AssistantMessage {
            content,
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn render_prompt_includes_schema_instruction() {
        let backend = FreeChatBackend::new("test-model", None);
        let messages = vec![Message {
            role: Role::User,
            content: "hello".into(),
        }];
        let options = CompletionOptions {
            json_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        let prompt = backend.render_prompt(&messages, &options);
        assert!(prompt.contains("hello"));
        assert!(prompt.contains("valid JSON"));
    }

    #[tokio::test]
    async fn complete_unwraps_the_first_generated_text_item() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"generated_text": "a free-tier answer"}
            ])))
            .mount(&server)
            .await;

        let backend = FreeChatBackend::new_for_test(server.uri());
        let messages = vec![Message {
            role: Role::User,
            content: "hello".into(),
        }];
        let reply = backend.complete(&messages, &CompletionOptions::default()).await.unwrap();
        assert_eq!(reply.content, "a free-tier answer");
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn rate_limited_response_maps_to_quota_exhausted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let backend = FreeChatBackend::new_for_test(server.uri());
        let messages = vec![Message {
            role: Role::User,
            content: "hello".into(),
        }];
        let err = backend.complete(&messages, &CompletionOptions::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::QuotaExhausted(_)));
    }
}
