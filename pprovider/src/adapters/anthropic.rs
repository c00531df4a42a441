//! Anthropic messages adapter.
//!
//! Anthropic does not accept system content in the turn list: the adapter
//! extracts it into the top-level `system` field and sends only user and
//! assistant turns. The reply is the first `text` content block; streaming
//! fragments come from `content_block_delta` events.

use std::fmt::Formatter;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::adapters::lines::LineBuffer;
use crate::{
    BoxedFragmentStream, ChatConfig, ModelProvider, ModelReply, ModelRequest, ProviderError,
    ProviderFuture, ProviderId, Role,
};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicProvider {
    config: Arc<ChatConfig>,
    transport: Arc<dyn AnthropicTransport>,
}

impl AnthropicProvider {
    pub fn new(config: Arc<ChatConfig>, transport: Arc<dyn AnthropicTransport>) -> Self {
        Self { config, transport }
    }

    pub fn default_http_transport(client: Client, config: &ChatConfig) -> AnthropicHttpTransport {
        let base_url = config.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL);
        AnthropicHttpTransport::new(client).with_base_url(base_url)
    }

    fn resolve_auth(&self) -> Result<AnthropicAuth, ProviderError> {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => Ok(AnthropicAuth::new(key.expose())),
            _ => Err(ProviderError::authentication(
                "no Anthropic API key configured",
            )),
        }
    }

    /// Splits the backend-agnostic history into Anthropic's shape: the
    /// system prompt moves to the `system` field, everything else keeps
    /// its position in the turn list.
    fn build_request(&self, request: ModelRequest, stream: bool) -> AnthropicRequest {
        let model = if request.model.trim().is_empty() {
            self.config.model.clone()
        } else {
            request.model
        };

        let (temperature, max_tokens) = self.config.sampling(&request.options);

        let mut system = None;
        let mut messages = Vec::new();
        for message in request.messages {
            match message.role {
                Role::System => {
                    if system.is_none() {
                        system = Some(message.content);
                    }
                }
                role => messages.push(AnthropicMessage {
                    role: role.as_str().to_string(),
                    content: message.content,
                }),
            }
        }

        AnthropicRequest {
            model,
            system,
            messages,
            temperature,
            max_tokens,
            stream,
        }
    }
}

impl ModelProvider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelReply, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let auth = self.resolve_auth()?;
            let anthropic_request = self.build_request(request, false);
            let response = self.transport.complete(anthropic_request, auth).await?;

            Ok(ModelReply {
                provider: ProviderId::Anthropic,
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
            let auth = self.resolve_auth()?;
            let anthropic_request = self.build_request(request, true);
            self.transport.stream(anthropic_request, auth).await
        })
    }
}

pub trait AnthropicTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: AnthropicRequest,
        auth: AnthropicAuth,
    ) -> ProviderFuture<'a, Result<AnthropicResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: AnthropicRequest,
        auth: AnthropicAuth,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct AnthropicHttpTransport {
    client: Client,
    base_url: String,
}

impl AnthropicHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: &AnthropicRequest,
        auth: &AnthropicAuth,
    ) -> Result<Response, ProviderError> {
        let url = self.endpoint("messages");
        let response = self
            .client
            .post(url)
            .header("x-api-key", auth.api_key())
            .header("anthropic-version", ANTHROPIC_VERSION)
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
            .unwrap_or_else(|| format!("Anthropic request failed with status {status}"));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::authentication(message)
            }
            StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ProviderError::timeout(message)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ProviderError::invalid_request(message)
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                ProviderError::unavailable(message)
            }
            _ => ProviderError::transport(message),
        }
    }
}

impl AnthropicTransport for AnthropicHttpTransport {
    fn complete<'a>(
        &'a self,
        mut request: AnthropicRequest,
        auth: AnthropicAuth,
    ) -> ProviderFuture<'a, Result<AnthropicResponse, ProviderError>> {
        Box::pin(async move {
            request.stream = false;
            let response = self.send(&request, &auth).await?;

            let parsed: AnthropicApiResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            AnthropicResponse::try_from(parsed)
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: AnthropicRequest,
        auth: AnthropicAuth,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(&request, &auth).await?;
            let mut bytes = response.bytes_stream();

            let stream = try_stream! {
                let mut sse_buffer = LineBuffer::default();
                let mut finished = false;

                while let Some(item) = bytes.next().await {
                    let chunk = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    sse_buffer.push(&chunk);

                    while let Some(line) = sse_buffer.next_line()? {
                        if !line.starts_with("data:") {
                            continue;
                        }

                        let payload = line.trim_start_matches("data:").trim();
                        let parsed: AnthropicApiStreamEvent = serde_json::from_str(payload)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;

                        match parsed.kind.as_str() {
                            "content_block_delta" => {
                                if let Some(delta) = parsed.delta
                                    && let Some(text) = delta.text
                                    && !text.is_empty()
                                {
                                    yield text;
                                }
                            }
                            "message_stop" => {
                                finished = true;
                                break;
                            }
                            _ => {}
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

#[derive(Clone, PartialEq, Eq)]
pub struct AnthropicAuth {
    api_key: String,
}

impl AnthropicAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_str()
    }
}

impl std::fmt::Debug for AnthropicAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AnthropicAuth([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

/// Reply extracted from the first text content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnthropicResponse {
    pub model: String,
    pub content: String,
}

impl TryFrom<AnthropicApiResponse> for AnthropicResponse {
    type Error = ProviderError;

    fn try_from(value: AnthropicApiResponse) -> Result<Self, Self::Error> {
        let content = value
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| {
                ProviderError::transport("Anthropic response did not include a text block")
            })?;

        Ok(Self {
            model: value.model,
            content,
        })
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<AnthropicApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
struct AnthropicApiErrorEnvelope {
    error: AnthropicApiError,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicApiResponse {
    model: String,
    content: Vec<AnthropicApiContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiStreamEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<AnthropicApiStreamDelta>,
}

#[derive(Debug, Deserialize)]
struct AnthropicApiStreamDelta {
    text: Option<String>,
}
