//! Conversation state plus generation on top of a [`ModelProvider`].

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use pcommon::{GenerationOptions, MetadataMap};
use pprovider::{
    ChatConfig, Message, ModelProvider, ModelRequest, ProviderId, Role, create_provider,
};

use crate::ChatError;
use crate::history::HistoryRecord;

/// Fragments of one streamed assistant turn. Borrows the session mutably,
/// so no other turn can start until the stream is dropped.
pub type ChatFragmentStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send + 'a>>;

/// One conversation bound to one backend.
///
/// The session owns the ordered history (at most one system message,
/// always at index zero) and routes every turn through the provider the
/// configuration selected at construction. Mutating operations take
/// `&mut self`, so a session can never have two turns in flight.
///
/// ```rust,no_run
/// use pchat::ChatSession;
/// use pprovider::{ChatConfig, ProviderId};
///
/// # fn demo() -> Result<(), pchat::ChatError> {
/// let config = ChatConfig::new(ProviderId::Ollama, "llama3.2");
/// let mut session = ChatSession::new(config)?;
/// session.set_system_prompt("You are terse.");
/// # Ok(())
/// # }
/// ```
pub struct ChatSession {
    config: Arc<ChatConfig>,
    provider: Arc<dyn ModelProvider>,
    history: Vec<Message>,
}

impl ChatSession {
    /// Builds the session and its provider in one step. Fails closed:
    /// a missing credential or compiled-out backend is reported here,
    /// before any history exists.
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let config = Arc::new(config);
        let provider = create_provider(Arc::clone(&config))?;
        Ok(Self::with_provider(config, provider))
    }

    /// Binds an already-built provider. This is the injection seam the
    /// tests use; [`ChatSession::new`] is this plus the factory.
    pub fn with_provider(config: Arc<ChatConfig>, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            config,
            provider,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider.id()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Replaces the system prompt. The previous system message (wherever
    /// an import left it) is removed and the new one lands at index zero.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.place_system_message(Message::new(Role::System, prompt));
    }

    /// Appends a message to the history. System messages do not append:
    /// they route through the same replace-at-index-zero rule as
    /// [`ChatSession::set_system_prompt`].
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.add_message_with_metadata(role, content, None);
    }

    pub fn add_message_with_metadata(
        &mut self,
        role: Role,
        content: impl Into<String>,
        metadata: Option<MetadataMap>,
    ) {
        let mut message = Message::new(role, content);
        if let Some(metadata) = metadata {
            message = message.with_metadata(metadata);
        }

        match role {
            Role::System => self.place_system_message(message),
            _ => self.history.push(message),
        }
    }

    /// Runs one complete turn: the optional user message joins the
    /// history, the full history goes to the backend, and the assistant
    /// reply is appended and returned. On failure the user message stays
    /// (the caller may retry the turn) but nothing else changes.
    pub async fn generate(&mut self, user_message: Option<String>) -> Result<String, ChatError> {
        self.generate_with(user_message, GenerationOptions::default())
            .await
    }

    pub async fn generate_with(
        &mut self,
        user_message: Option<String>,
        options: GenerationOptions,
    ) -> Result<String, ChatError> {
        if let Some(content) = user_message {
            self.history.push(Message::new(Role::User, content));
        }

        let request = self.build_request(options.with_streaming(false))?;
        let reply = self.provider.complete(request).await?;
        self.history
            .push(Message::new(Role::Assistant, reply.content.clone()));
        Ok(reply.content)
    }

    /// Streams one turn fragment by fragment. The assistant message is
    /// committed to the history only after the final fragment has been
    /// consumed; dropping the stream early cancels the turn and leaves
    /// only the user message behind.
    pub fn stream(&mut self, user_message: Option<String>) -> Result<ChatFragmentStream<'_>, ChatError> {
        self.stream_with(user_message, GenerationOptions::default())
    }

    pub fn stream_with(
        &mut self,
        user_message: Option<String>,
        options: GenerationOptions,
    ) -> Result<ChatFragmentStream<'_>, ChatError> {
        if let Some(content) = user_message {
            self.history.push(Message::new(Role::User, content));
        }

        let request = self.build_request(options.with_streaming(true))?;
        let provider = Arc::clone(&self.provider);
        let history = &mut self.history;

        let stream = try_stream! {
            let mut fragments = provider.stream(request).await?;
            let mut reply = String::new();
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment?;
                reply.push_str(&fragment);
                yield fragment;
            }
            history.push(Message::new(Role::Assistant, reply));
        };

        Ok(Box::pin(stream))
    }

    /// Drops the conversation so far. With `keep_system` the system
    /// prompt survives, matching a "same persona, fresh conversation"
    /// reset.
    pub fn clear_history(&mut self, keep_system: bool) {
        if keep_system {
            self.history.retain(|message| message.role == Role::System);
        } else {
            self.history.clear();
        }
    }

    pub fn export_history(&self) -> Vec<HistoryRecord> {
        self.history.iter().map(HistoryRecord::from).collect()
    }

    /// Replaces the history wholesale. All records are validated before
    /// any mutation, so a bad record leaves the existing history intact.
    pub fn import_history(&mut self, records: Vec<HistoryRecord>) -> Result<(), ChatError> {
        let history = records
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        self.history = history;
        Ok(())
    }

    fn place_system_message(&mut self, message: Message) {
        self.history.retain(|m| m.role != Role::System);
        self.history.insert(0, message);
    }

    fn build_request(&self, options: GenerationOptions) -> Result<ModelRequest, ChatError> {
        ModelRequest::builder(self.config.model.clone())
            .messages(self.history.clone())
            .options(options)
            .build()
            .map_err(ChatError::from)
    }
}
