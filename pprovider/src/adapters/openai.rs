//! OpenAI chat-completions adapter.
//!
//! System content travels inline in the turn list; the reply is the first
//! choice's message content; streaming is SSE with a `[DONE]` terminator.

use std::fmt::Formatter;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::adapters::lines::LineBuffer;
use crate::{
    BoxedFragmentStream, ChatConfig, Message, ModelProvider, ModelReply, ModelRequest,
    ProviderError, ProviderFuture, ProviderId, Role,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiProvider {
    config: Arc<ChatConfig>,
    transport: Arc<dyn OpenAiTransport>,
}

impl OpenAiProvider {
    pub fn new(config: Arc<ChatConfig>, transport: Arc<dyn OpenAiTransport>) -> Self {
        Self { config, transport }
    }

    pub fn default_http_transport(client: Client, config: &ChatConfig) -> OpenAiHttpTransport {
        let base_url = config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        OpenAiHttpTransport::new(client).with_base_url(base_url)
    }

    fn resolve_auth(&self) -> Result<OpenAiAuth, ProviderError> {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => Ok(OpenAiAuth::new(key.expose())),
            _ => Err(ProviderError::authentication(
                "no OpenAI API key configured",
            )),
        }
    }

    fn build_request(&self, request: ModelRequest, stream: bool) -> OpenAiRequest {
        let model = if request.model.trim().is_empty() {
            self.config.model.clone()
        } else {
            request.model
        };

        let (temperature, max_tokens) = self.config.sampling(&request.options);
        let messages = request
            .messages
            .into_iter()
            .map(OpenAiMessage::from)
            .collect();

        OpenAiRequest {
            model,
            messages,
            temperature,
            max_tokens,
            stream,
        }
    }
}

impl ModelProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelReply, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let auth = self.resolve_auth()?;
            let openai_request = self.build_request(request, false);
            let response = self.transport.complete(openai_request, auth).await?;

            Ok(ModelReply {
                provider: ProviderId::OpenAi,
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
            let openai_request = self.build_request(request, true);
            self.transport.stream(openai_request, auth).await
        })
    }
}

/// Transport seam so providers can be exercised without the network.
pub trait OpenAiTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
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
        request: &OpenAiRequest,
        auth: &OpenAiAuth,
    ) -> Result<Response, ProviderError> {
        let url = self.endpoint("chat/completions");
        let response = self
            .client
            .post(url)
            .bearer_auth(auth.api_key())
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
            .unwrap_or_else(|| format!("OpenAI request failed with status {status}"));

        map_status(status, message)
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        mut request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>> {
        Box::pin(async move {
            request.stream = false;
            let response = self.send(&request, &auth).await?;

            let parsed: OpenAiApiResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            OpenAiResponse::try_from(parsed)
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: OpenAiRequest,
        auth: OpenAiAuth,
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
                        if payload == "[DONE]" {
                            finished = true;
                            break;
                        }

                        let parsed: OpenAiApiStreamResponse = serde_json::from_str(payload)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;

                        if let Some(choice) = parsed.choices.first()
                            && let Some(delta) = &choice.delta.content
                            && !delta.is_empty()
                        {
                            yield delta.clone();
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
pub struct OpenAiAuth {
    api_key: String,
}

impl OpenAiAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_str()
    }
}

impl std::fmt::Debug for OpenAiAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("OpenAiAuth([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenAiMessage {
    pub role: String,
    pub content: String,
}

impl From<Message> for OpenAiMessage {
    fn from(value: Message) -> Self {
        Self {
            role: value.role.as_str().to_string(),
            content: value.content,
        }
    }
}

/// Reply extracted from the first choice, with backend framing stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiResponse {
    pub model: String,
    pub content: String,
}

impl TryFrom<OpenAiApiResponse> for OpenAiResponse {
    type Error = ProviderError;

    fn try_from(value: OpenAiApiResponse) -> Result<Self, Self::Error> {
        let choice = value
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::transport("OpenAI response did not include choices"))?;

        Ok(Self {
            model: value.model,
            content: choice.message.content.unwrap_or_default(),
        })
    }
}

fn map_status(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(message),
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

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OpenAiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
struct OpenAiApiErrorEnvelope {
    error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiApiResponse {
    model: String,
    choices: Vec<OpenAiApiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiChoice {
    message: OpenAiApiAssistantMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiAssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiStreamResponse {
    choices: Vec<OpenAiApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiStreamChoice {
    delta: OpenAiApiStreamDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiStreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProviderErrorKind, VecFragmentStream};
    use futures_util::StreamExt;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeTransport {
        captured_auth: Mutex<Option<OpenAiAuth>>,
        captured_request: Mutex<Option<OpenAiRequest>>,
    }

    impl OpenAiTransport for FakeTransport {
        fn complete<'a>(
            &'a self,
            request: OpenAiRequest,
            auth: OpenAiAuth,
        ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>> {
            Box::pin(async move {
                let model = request.model.clone();
                *self.captured_request.lock().expect("request lock") = Some(request);
                *self.captured_auth.lock().expect("auth lock") = Some(auth);

                Ok(OpenAiResponse {
                    model,
                    content: "hello world".to_string(),
                })
            })
        }

        fn stream<'a>(
            &'a self,
            request: OpenAiRequest,
            auth: OpenAiAuth,
        ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>> {
            Box::pin(async move {
                *self.captured_request.lock().expect("request lock") = Some(request);
                *self.captured_auth.lock().expect("auth lock") = Some(auth);

                let stream = VecFragmentStream::new(vec![
                    Ok("hello".to_string()),
                    Ok(" world".to_string()),
                ]);
                Ok(Box::pin(stream) as BoxedFragmentStream<'a>)
            })
        }
    }

    fn provider_with(config: ChatConfig) -> (OpenAiProvider, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::default());
        let provider = OpenAiProvider::new(Arc::new(config), transport.clone());
        (provider, transport)
    }

    #[tokio::test]
    async fn complete_fills_sampling_from_configuration() {
        let config = ChatConfig::new(ProviderId::OpenAi, "gpt-4o-mini")
            .with_api_key("sk-live-123")
            .with_temperature(0.5)
            .with_max_tokens(256);
        let (provider, transport) = provider_with(config);

        let request = ModelRequest::new("gpt-4o", vec![Message::new(Role::User, "hi")]);
        let reply = provider.complete(request).await.expect("completion works");

        assert_eq!(reply.provider, ProviderId::OpenAi);
        assert_eq!(reply.content, "hello world");

        let captured = transport
            .captured_request
            .lock()
            .expect("request lock")
            .clone()
            .expect("request captured");
        assert_eq!(captured.model, "gpt-4o");
        assert_eq!(captured.temperature, 0.5);
        assert_eq!(captured.max_tokens, 256);
        assert!(!captured.stream);

        let auth = transport
            .captured_auth
            .lock()
            .expect("auth lock")
            .clone()
            .expect("auth captured");
        assert_eq!(auth.api_key(), "sk-live-123");
    }

    #[tokio::test]
    async fn per_call_overrides_beat_configuration_defaults() {
        let config = ChatConfig::new(ProviderId::OpenAi, "gpt-4o-mini").with_api_key("sk-live-123");
        let (provider, transport) = provider_with(config);

        let request = ModelRequest::new("gpt-4o-mini", vec![Message::new(Role::User, "hi")])
            .with_temperature(0.9)
            .with_max_tokens(64);
        provider.complete(request).await.expect("completion works");

        let captured = transport
            .captured_request
            .lock()
            .expect("request lock")
            .clone()
            .expect("request captured");
        assert_eq!(captured.temperature, 0.9);
        assert_eq!(captured.max_tokens, 64);
    }

    #[tokio::test]
    async fn system_content_stays_inline_in_the_turn_list() {
        let config = ChatConfig::new(ProviderId::OpenAi, "gpt-4o-mini").with_api_key("sk-live-123");
        let (provider, transport) = provider_with(config);

        let request = ModelRequest::new(
            "gpt-4o-mini",
            vec![
                Message::new(Role::System, "be concise"),
                Message::new(Role::User, "hi"),
            ],
        );
        provider.complete(request).await.expect("completion works");

        let captured = transport
            .captured_request
            .lock()
            .expect("request lock")
            .clone()
            .expect("request captured");
        assert_eq!(captured.messages.len(), 2);
        assert_eq!(captured.messages[0].role, "system");
        assert_eq!(captured.messages[0].content, "be concise");
    }

    #[tokio::test]
    async fn missing_api_key_is_an_authentication_error() {
        let (provider, _) = provider_with(ChatConfig::new(ProviderId::OpenAi, "gpt-4o-mini"));

        let request = ModelRequest::new("gpt-4o-mini", vec![Message::new(Role::User, "hi")]);
        let error = provider.complete(request).await.expect_err("must fail");
        assert_eq!(error.kind, ProviderErrorKind::Authentication);
    }

    #[tokio::test]
    async fn stream_yields_fragments_in_arrival_order() {
        let config = ChatConfig::new(ProviderId::OpenAi, "gpt-4o-mini").with_api_key("sk-live-123");
        let (provider, transport) = provider_with(config);

        let request = ModelRequest::new("gpt-4o-mini", vec![Message::new(Role::User, "hi")]);
        let mut stream = provider.stream(request).await.expect("stream builds");

        assert_eq!(stream.next().await, Some(Ok("hello".to_string())));
        assert_eq!(stream.next().await, Some(Ok(" world".to_string())));
        assert_eq!(stream.next().await, None);

        let captured = transport
            .captured_request
            .lock()
            .expect("request lock")
            .clone()
            .expect("request captured");
        assert!(captured.stream);
    }

    #[test]
    fn api_response_without_choices_is_a_transport_error() {
        let parsed: OpenAiApiResponse =
            serde_json::from_str(r#"{"model":"gpt-4o-mini","choices":[]}"#).expect("parse");
        let error = OpenAiResponse::try_from(parsed).expect_err("must fail");
        assert_eq!(error.kind, ProviderErrorKind::Transport);
    }

    #[test]
    fn error_envelope_message_is_extracted() {
        let body = r#"{"error":{"message":"rate limited","type":"rate_limit_error"}}"#;
        assert_eq!(extract_error_message(body), Some("rate limited".to_string()));
        assert_eq!(extract_error_message("not json"), None);
    }
}
