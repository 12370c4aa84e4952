//! Chat Client Abstraction (spec.md §4.6): a uniform `complete`/`stream`
//! capability over pluggable backends, with tool-descriptor JSON
//! serialization and a retry/token-tracking middleware chain. Grounded in
//! the `Arc<dyn LlmClient + Send + Sync>` trait-object shape used elsewhere
//! in this codebase family for swappable chat backends.

pub mod backend;
pub mod factory;
pub mod middleware;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Describes a callable tool to the model. Serialized to plain JSON rather
/// than any framework-specific function-descriptor type — the documented
/// failure class this abstraction exists to avoid is a descriptor type that
/// turns out not to be JSON-serializable at the transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDescriptor>,
    /// When set, the backend is asked (via prompt or native tool-calling,
    /// backend's choice) to return JSON matching this schema.
    pub json_schema: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AssistantMessage {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> Result<AssistantMessage, CoreError>;

    /// Streams response chunks via `on_chunk`; returns the same completed
    /// message `complete` would once the stream ends. The default
    /// implementation treats the backend as non-streaming and delivers the
    /// whole response as a single chunk, so backends without native
    /// streaming support still satisfy the trait.
    async fn stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        on_chunk: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<AssistantMessage, CoreError> {
        let message = self.complete(messages, options).await?;
        on_chunk(&message.content);
        Ok(message)
    }
}
