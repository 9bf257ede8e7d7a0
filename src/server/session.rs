use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{ChatMessage, ChatRequest};
use crate::server::storage_traits::{BoxFuture, SessionStore};

/// Process-local session history; lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Option<Vec<ChatMessage>>> {
        Box::pin(async move { self.sessions.read().await.get(session_id).cloned() })
    }

    fn save<'a>(&'a self, session_id: &'a str, messages: Vec<ChatMessage>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.sessions
                .write()
                .await
                .insert(session_id.to_string(), messages);
        })
    }
}

/// Conversation about to be sent upstream, keyed by its session id.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ChatMessage>,
}

impl Session {
    /// Prepends stored history for a known string `sessionState`; otherwise
    /// starts over with the system prompt. Non-string state gets a fresh id.
    pub async fn prepare(store: &dyn SessionStore, system_prompt: &str, request: ChatRequest) -> Self {
        let (id, history) = match &request.session_state {
            Some(Value::String(id)) => (id.clone(), store.load(id).await),
            _ => (Uuid::new_v4().to_string(), None),
        };
        if request.context.is_some() {
            tracing::debug!(session_id = %id, "Request context is not forwarded upstream");
        }

        let mut messages = history.unwrap_or_else(|| {
            if system_prompt.is_empty() {
                Vec::new()
            } else {
                vec![ChatMessage::system(system_prompt)]
            }
        });
        messages.extend(request.messages);
        Self { id, messages }
    }

    /// Value echoed back as `sessionState`.
    pub fn state(&self) -> Option<Value> {
        Some(Value::String(self.id.clone()))
    }

    /// Stores the conversation plus the assistant reply, without file payloads.
    pub async fn finish(self, store: &dyn SessionStore, reply: ChatMessage) {
        let mut messages = self.messages;
        messages.push(reply);
        for message in &mut messages {
            message.files = None;
        }
        store.save(&self.id, messages).await;
    }
}
