// I/O seams: REST client and push channel. Production impls live in `http` and
// `websocket`; tests inject their own.

mod http;
pub mod socketio;
mod websocket;
pub mod wire;

use async_trait::async_trait;

use crate::error::{ChatError, ChatResult};
use crate::state::{ChatMessage, Notification};

pub use http::HttpChatApi;
pub use socketio::RawEvent;
pub use websocket::WebSocketPushTransport;

pub const EVENT_CHAT_MESSAGE: &str = "chatMessage";
pub const EVENT_RECEIVE_MESSAGE: &str = "receive-message";

#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    async fn fetch_messages(&self) -> ChatResult<Vec<ChatMessage>>;
    async fn send_message(&self, text: &str, sender: &str) -> ChatResult<()>;
    async fn send_reply(&self, message_id: &str, text: &str, sender: &str) -> ChatResult<()>;
    async fn fetch_notifications(&self, user_id: &str) -> ChatResult<Vec<Notification>>;
}

#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Opens one subscription. Dropping the returned connection unsubscribes.
    async fn connect(&self) -> ChatResult<Box<dyn PushConnection>>;
}

#[async_trait]
pub trait PushConnection: Send {
    /// Next application event. `Ok(None)` means the server closed the channel.
    async fn next_event(&mut self) -> ChatResult<Option<RawEvent>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    ChatMessage(ChatMessage),
    DirectMessage {
        sender_id: String,
        sender_name: String,
        content: String,
    },
    Other(String),
}

impl PushEvent {
    pub fn decode(raw: RawEvent) -> ChatResult<PushEvent> {
        match raw.name.as_str() {
            EVENT_CHAT_MESSAGE => {
                let payload = raw
                    .args
                    .into_iter()
                    .next()
                    .ok_or_else(|| ChatError::Decode("chatMessage without payload".into()))?;
                Ok(PushEvent::ChatMessage(wire::decode_message(payload)?))
            }
            EVENT_RECEIVE_MESSAGE => {
                let mut args = raw.args.into_iter();
                let sender_id = match args.next() {
                    Some(serde_json::Value::String(s)) if !s.is_empty() => s,
                    Some(serde_json::Value::Number(n)) => n.to_string(),
                    other => {
                        return Err(ChatError::Decode(format!(
                            "receive-message sender id: {other:?}"
                        )))
                    }
                };
                let sender_name = match args.next() {
                    Some(serde_json::Value::String(s)) => s,
                    _ => String::new(),
                };
                let content = match args.next() {
                    Some(serde_json::Value::String(s)) => s,
                    _ => String::new(),
                };
                Ok(PushEvent::DirectMessage {
                    sender_id,
                    sender_name,
                    content,
                })
            }
            _ => Ok(PushEvent::Other(raw.name)),
        }
    }
}
