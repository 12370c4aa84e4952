use std::borrow::Cow;
use std::sync::OnceLock;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use serde_json::json;

use super::Embedder;
use crate::error::CoreError;

const DEFAULT_BASE: &str = "https://api.openai.com/v1";
const BASE_ENV: &str = "LITLOOP_EMBEDDING_BASE_URL";

fn http_client() -> &'static ClientWithMiddleware {
    static CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();
    CLIENT.get_or_init(|| {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    })
}

fn base_url() -> Cow<'static, str> {
    match std::env::var(BASE_ENV) {
        Ok(value) if !value.trim().is_empty() => Cow::Owned(value),
        _ => Cow::Borrowed(DEFAULT_BASE),
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// `Embedder` backed by an OpenAI-compatible `/embeddings` endpoint. Not on
/// the default path (spec.md frames embedding as an abstract capability);
/// selected explicitly when an API key is configured.
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let url = format!("{}/embeddings", base_url());
        let response = http_client()
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| CoreError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::Embedding(format!(
                "embedding backend returned status {}",
                response.status()
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Embedding(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CoreError::Embedding("empty embedding response".into()))
    }
}
