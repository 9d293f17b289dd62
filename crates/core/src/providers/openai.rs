//! Providers for OpenAI-compatible `/embeddings` and `/chat/completions` endpoints.

use crate::embeddings::EmbeddingProvider;
use crate::error::{EmbeddingError, GenerationError};
use crate::traits::GenerationProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL such as `https://api.openai.com/v1/`.
    pub base_url: Url,
    pub api_key: Option<String>,
    pub model: String,
}

impl EndpointConfig {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>) -> Result<Self, url::ParseError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Ok(Self {
            base_url: Url::parse(&normalized)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: model.into(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Failure class of an HTTP exchange with a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

pub fn classify_status(status: StatusCode) -> FailureClass {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        FailureClass::Transient
    } else {
        FailureClass::Permanent
    }
}

fn classify_transport(error: &reqwest::Error) -> FailureClass {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        FailureClass::Transient
    } else {
        FailureClass::Permanent
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

async fn failure_detail(response: reqwest::Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or(body);
    (status, detail)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbeddingProvider {
    client: Client,
    endpoint: EndpointConfig,
    dimensions: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(endpoint: EndpointConfig, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            dimensions,
        }
    }

    fn embedding_error(class: FailureClass, message: String) -> EmbeddingError {
        match class {
            FailureClass::Transient => EmbeddingError::Transient(message),
            FailureClass::Permanent => EmbeddingError::Permanent(message),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Permanent("provider returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self
            .endpoint
            .url("embeddings")
            .map_err(|error| EmbeddingError::Permanent(error.to_string()))?;
        tracing::debug!(%url, batch_size = texts.len(), model = %self.endpoint.model, "embedding batch");

        let request = self.endpoint.authorize(self.client.post(url)).json(&EmbeddingRequest {
            model: &self.endpoint.model,
            input: texts.to_vec(),
        });
        let response = request
            .send()
            .await
            .map_err(|error| Self::embedding_error(classify_transport(&error), error.to_string()))?;

        if !response.status().is_success() {
            let (status, detail) = failure_detail(response).await;
            return Err(Self::embedding_error(
                classify_status(status),
                format!("{status}: {detail}"),
            ));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::Transient(format!("unreadable response: {error}")))?;
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::Permanent(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        parsed
            .data
            .sort_by_key(|item| item.index.unwrap_or(usize::MAX));
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatProvider {
    client: Client,
    endpoint: EndpointConfig,
}

impl OpenAiChatProvider {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    fn generation_error(class: FailureClass, message: String) -> GenerationError {
        match class {
            FailureClass::Transient => GenerationError::Transient(message),
            FailureClass::Permanent => GenerationError::Permanent(message),
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiChatProvider {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self
            .endpoint
            .url("chat/completions")
            .map_err(|error| GenerationError::Permanent(error.to_string()))?;
        tracing::debug!(%url, prompt_len = prompt.len(), model = %self.endpoint.model, "generation request");

        let request = self.endpoint.authorize(self.client.post(url)).json(&ChatRequest {
            model: &self.endpoint.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        });
        let response = request
            .send()
            .await
            .map_err(|error| Self::generation_error(classify_transport(&error), error.to_string()))?;

        if !response.status().is_success() {
            let (status, detail) = failure_detail(response).await;
            return Err(Self::generation_error(
                classify_status(status),
                format!("{status}: {detail}"),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| GenerationError::Transient(format!("unreadable response: {error}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Permanent("completion had no content".to_string()))
    }
}
