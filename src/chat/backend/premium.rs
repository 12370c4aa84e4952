use std::borrow::Cow;
use std::sync::OnceLock;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chat::{AssistantMessage, ChatClient, CompletionOptions, Message, Role, TokenUsage, ToolCallRequest};
use crate::error::CoreError;

const DEFAULT_BASE: &str = "https://api.openai.com/v1";
const BASE_ENV: &str = "LITLOOP_CHAT_BASE_URL";

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
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    function: Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ChatToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Chat backend against an OpenAI-compatible `/chat/completions` endpoint.
/// The premium option in spec.md §4.6's backend selection policy: used when
/// an API key is configured, otherwise the caller falls back to
/// `FreeChatBackend`.
pub struct PremiumChatBackend {
    base_url: Cow<'static, str>,
    api_key: String,
    model: String,
}

impl PremiumChatBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = match std::env::var(BASE_ENV) {
            Ok(v) if !v.trim().is_empty() => Cow::Owned(v),
            _ => Cow::Borrowed(DEFAULT_BASE),
        };
        Self {
            base_url,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    #[cfg(test)]
    fn new_for_test(base_url: String) -> Self {
        Self {
            base_url: Cow::Owned(base_url),
            api_key: "test-key".into(),
            model: "test-model".into(),
        }
    }
}

#[async_trait]
impl ChatClient for PremiumChatBackend {
    fn name(&self) -> &str {
        "premium"
    }

    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<AssistantMessage, CoreError> {
        let wire_messages = messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();
        let tools = options
            .tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters_schema,
                }),
            })
            .collect();

        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            tools,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = http_client()
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::BackendUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
            || response.status() == reqwest::StatusCode::PAYMENT_REQUIRED
        {
            return Err(CoreError::QuotaExhausted(format!(
                "premium backend returned status {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(CoreError::BackendUnavailable(format!(
                "premium backend returned status {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::BackendUnavailable(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::BackendUnavailable("empty choices list".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .filter_map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments).ok()?;
                Some(ToolCallRequest {
                    tool_name: call.function.name,
                    arguments,
                })
            })
            .collect();

        let usage = body.usage.unwrap_or_default();

        Ok(AssistantMessage {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}
