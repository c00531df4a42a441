//! End-to-end conversation flows through the public pchat surface.

use std::sync::Arc;

use futures_util::StreamExt;
use pchat::prelude::*;
use pprovider::{
    BoxedFragmentStream, ModelReply, ModelRequest, ProviderError, ProviderFuture,
    VecFragmentStream,
};

/// Counts turns and answers "reply N" so multi-turn ordering is visible.
struct CountingProvider {
    counter: std::sync::Mutex<u32>,
}

impl CountingProvider {
    fn new() -> Self {
        Self {
            counter: std::sync::Mutex::new(0),
        }
    }
}

impl ModelProvider for CountingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelReply, ProviderError>> {
        Box::pin(async move {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            Ok(ModelReply {
                provider: ProviderId::Ollama,
                model: request.model,
                content: format!("reply {counter}"),
            })
        })
    }

    fn stream<'a>(
        &'a self,
        _request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>> {
        Box::pin(async move {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            let fragments = vec![Ok("reply ".to_string()), Ok(counter.to_string())];
            Ok(Box::pin(VecFragmentStream::new(fragments)) as BoxedFragmentStream<'a>)
        })
    }
}

fn session() -> ChatSession {
    let config = Arc::new(ChatConfig::new(ProviderId::Ollama, "llama3.2"));
    ChatSession::with_provider(config, Arc::new(CountingProvider::new()))
}

#[tokio::test]
async fn multi_turn_conversation_accumulates_alternating_history() {
    let mut session = session();
    session.set_system_prompt("be brief");

    let first = session.generate(Some("one".to_string())).await.unwrap();
    let second = session.generate(Some("two".to_string())).await.unwrap();

    assert_eq!(first, "reply 1");
    assert_eq!(second, "reply 2");

    let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
}

#[tokio::test]
async fn streamed_and_complete_turns_share_one_history() {
    let mut session = session();

    let mut stream = session.stream(Some("one".to_string())).unwrap();
    let mut streamed = String::new();
    while let Some(fragment) = stream.next().await {
        streamed.push_str(&fragment.unwrap());
    }
    drop(stream);
    assert_eq!(streamed, "reply 1");

    let reply = session.generate(Some("two".to_string())).await.unwrap();
    assert_eq!(reply, "reply 2");
    assert_eq!(session.history().len(), 4);
    assert_eq!(session.history()[1].content, "reply 1");
}

#[tokio::test]
async fn exported_history_restores_into_a_fresh_session_via_json() {
    let mut session = session();
    session.set_system_prompt("be brief");
    session.generate(Some("hello".to_string())).await.unwrap();

    let json = serde_json::to_string(&session.export_history()).unwrap();
    let records: Vec<HistoryRecord> = serde_json::from_str(&json).unwrap();

    let mut restored = self::session();
    restored.import_history(records).unwrap();
    assert_eq!(restored.history(), session.history());

    // The restored session keeps going from the imported state.
    let reply = restored.generate(Some("more".to_string())).await.unwrap();
    assert_eq!(reply, "reply 1");
    assert_eq!(restored.history().len(), 5);
}
