// Server JSON shapes and their mapping onto state types.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};
use crate::state::{ChatMessage, ChatReply, Notification, ANONYMOUS_SENDER};

/// `createdAt` arrives as an ISO-8601 string from the REST API and sometimes as
/// epoch milliseconds from the push channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    pub(crate) fn to_millis(&self) -> ChatResult<i64> {
        match self {
            WireTimestamp::Millis(ms) => Ok(*ms),
            WireTimestamp::Text(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.timestamp_millis())
                .map_err(|e| ChatError::Decode(format!("bad timestamp {s:?}: {e}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireReply {
    #[serde(default)]
    sender: Option<String>,
    #[serde(default, alias = "message")]
    text: String,
    #[serde(default, rename = "createdAt")]
    created_at: Option<WireTimestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    sender: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: WireTimestamp,
    #[serde(default)]
    replies: Vec<WireReply>,
}

impl WireMessage {
    pub(crate) fn into_message(self) -> ChatResult<ChatMessage> {
        if self.id.trim().is_empty() {
            return Err(ChatError::Decode("message without id".into()));
        }
        let replies = self
            .replies
            .into_iter()
            .map(|r| {
                Ok(ChatReply {
                    sender: sender_or_anonymous(r.sender),
                    text: r.text,
                    created_at: match r.created_at {
                        Some(ts) => ts.to_millis()?,
                        None => 0,
                    },
                })
            })
            .collect::<ChatResult<Vec<_>>>()?;
        Ok(ChatMessage {
            id: self.id,
            text: self.text,
            sender: sender_or_anonymous(self.sender),
            created_at: self.created_at.to_millis()?,
            replies,
        })
    }
}

fn sender_or_anonymous(sender: Option<String>) -> String {
    sender
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_SENDER.to_string())
}

pub fn decode_message(value: serde_json::Value) -> ChatResult<ChatMessage> {
    serde_json::from_value::<WireMessage>(value)?.into_message()
}

/// Decodes a message list, skipping (and logging) entries that do not parse.
pub fn decode_message_list(value: serde_json::Value) -> ChatResult<Vec<ChatMessage>> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return Ok(vec![]),
        other => {
            return Err(ChatError::Decode(format!(
                "expected message array, got {}",
                json_kind(&other)
            )))
        }
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match decode_message(item) {
            Ok(m) => out.push(m),
            Err(e) => tracing::warn!(%e, "skipping malformed message in snapshot"),
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Deserialize)]
struct WireNotification {
    #[serde(rename = "_id", alias = "id", default)]
    id: String,
    #[serde(default)]
    read: bool,
    #[serde(default, rename = "createdAt")]
    created_at: Option<WireTimestamp>,
}

pub fn decode_notifications(value: serde_json::Value) -> ChatResult<Vec<Notification>> {
    let items: Vec<WireNotification> = serde_json::from_value(value)?;
    Ok(items
        .into_iter()
        .map(|n| Notification {
            id: n.id,
            read: n.read,
            created_at: n.created_at.and_then(|ts| ts.to_millis().ok()),
        })
        .collect())
}

pub fn unread_notification_count(notifications: &[Notification]) -> u32 {
    notifications.iter().filter(|n| !n.read).count() as u32
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageBody<'a> {
    pub(crate) message: &'a str,
    pub(crate) sender: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReplyPayload<'a> {
    pub(crate) message: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendReplyBody<'a> {
    #[serde(rename = "messageId")]
    pub(crate) message_id: &'a str,
    pub(crate) reply: ReplyPayload<'a>,
    pub(crate) sender: &'a str,
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
