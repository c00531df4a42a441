//! Ollama local-inference adapter.
//!
//! Talks to the native `/api/chat` endpoint: no auth, sampling travels in
//! the `options` object (`num_predict` is Ollama's output budget), and
//! streaming is one JSON object per line with a `done` terminator.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::adapters::lines::LineBuffer;
use crate::{
    BoxedFragmentStream, ChatConfig, Message, ModelProvider, ModelReply, ModelRequest,
    ProviderError, ProviderFuture, ProviderId,
};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone)]
pub struct OllamaProvider {
    config: Arc<ChatConfig>,
    transport: Arc<dyn OllamaTransport>,
}

impl OllamaProvider {
    pub fn new(config: Arc<ChatConfig>, transport: Arc<dyn OllamaTransport>) -> Self {
        Self { config, transport }
    }

    pub fn default_http_transport(client: Client, config: &ChatConfig) -> OllamaHttpTransport {
        let base_url = config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        OllamaHttpTransport::new(client).with_base_url(base_url)
    }

    fn build_request(&self, request: ModelRequest, stream: bool) -> OllamaRequest {
        let model = if request.model.trim().is_empty() {
            self.config.model.clone()
        } else {
            request.model
        };

        let (temperature, max_tokens) = self.config.sampling(&request.options);
        let messages = request
            .messages
            .into_iter()
            .map(OllamaMessage::from)
            .collect();

        OllamaRequest {
            model,
            messages,
            options: OllamaOptions {
                temperature,
                num_predict: max_tokens,
            },
            stream,
        }
    }
}

impl ModelProvider for OllamaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelReply, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let ollama_request = self.build_request(request, false);
            let response = self.transport.complete(ollama_request).await?;

            Ok(ModelReply {
                provider: ProviderId::Ollama,
                model: response.model,
                content: response.content,
            })
        })
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let ollama_request = self.build_request(request, true);
            self.transport.stream(ollama_request).await
        })
    }
}

pub trait OllamaTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: OllamaRequest,
    ) -> ProviderFuture<'a, Result<OllamaResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: OllamaRequest,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct OllamaHttpTransport {
    client: Client,
    base_url: String,
}

impl OllamaHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: &OllamaRequest) -> Result<Response, ProviderError> {
        let url = self.endpoint("api/chat");
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::timeout(err.to_string())
                } else {
                    ProviderError::transport(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        Ok(response)
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("Ollama request failed with status {status}"));

        match status {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                ProviderError::invalid_request(message)
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ProviderError::timeout(message)
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                ProviderError::unavailable(message)
            }
            _ => ProviderError::transport(message),
        }
    }
}

impl OllamaTransport for OllamaHttpTransport {
    fn complete<'a>(
        &'a self,
        mut request: OllamaRequest,
    ) -> ProviderFuture<'a, Result<OllamaResponse, ProviderError>> {
        Box::pin(async move {
            request.stream = false;
            let response = self.send(&request).await?;

            let parsed: OllamaApiResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            Ok(OllamaResponse {
                model: parsed.model,
                content: parsed.message.content,
            })
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: OllamaRequest,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(&request).await?;
            let mut bytes = response.bytes_stream();

            let stream = try_stream! {
                let mut line_buffer = LineBuffer::default();
                let mut finished = false;

                while let Some(item) = bytes.next().await {
                    let chunk = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    line_buffer.push(&chunk);

                    while let Some(line) = line_buffer.next_line()? {
                        if line.is_empty() {
                            continue;
                        }

                        let parsed: OllamaApiResponse = serde_json::from_str(&line)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;

                        if !parsed.message.content.is_empty() {
                            yield parsed.message.content;
                        }

                        if parsed.done {
                            finished = true;
                            break;
                        }
                    }

                    if finished {
                        break;
                    }
                }
            };

            Ok(Box::pin(stream) as BoxedFragmentStream<'a>)
        })
    }
}

/// Read-only diagnostic against the local model catalog. Not part of the
/// provider contract; model identifiers pass through unvalidated.
pub async fn list_models(base_url: impl Into<String>) -> Result<Vec<String>, ProviderError> {
    let base_url = base_url.into();
    let endpoint = format!("{}/api/tags", base_url.trim_end_matches('/'));

    let response = Client::new().get(endpoint).send().await.map_err(|err| {
        if err.is_timeout() {
            ProviderError::timeout(err.to_string())
        } else {
            ProviderError::transport(err.to_string())
        }
    })?;

    if !response.status().is_success() {
        let code = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::transport(format!(
            "http {code}: {}",
            truncate(&body, 4096)
        )));
    }

    let parsed = response
        .json::<OllamaTagsResponse>()
        .await
        .map_err(|err| ProviderError::transport(err.to_string()))?;

    let mut ids = parsed
        .models
        .into_iter()
        .map(|m| m.name)
        .collect::<Vec<_>>();
    ids.sort();
    Ok(ids)
}

fn truncate(input: &str, max: usize) -> String {
    if input.len() <= max {
        return input.to_string();
    }
    let mut output = input[..max].to_string();
    output.push_str("...");
    output
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OllamaApiErrorEnvelope>(body).ok()?;
    Some(parsed.error)
}

#[derive(Debug, Deserialize)]
struct OllamaApiErrorEnvelope {
    error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub options: OllamaOptions,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
}

impl From<Message> for OllamaMessage {
    fn from(value: Message) -> Self {
        Self {
            role: value.role.as_str().to_string(),
            content: value.content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OllamaOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaResponse {
    pub model: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaApiResponse {
    #[serde(default)]
    model: String,
    message: OllamaApiMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaApiMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}
