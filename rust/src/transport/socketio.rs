//! Minimal Socket.IO v5 / Engine.IO v4 text-packet codec.
//!
//! Only what a receive-only subscriber needs: the open handshake, heartbeats,
//! namespace connect/disconnect and EVENT packets. Binary attachments and acks
//! are reported as [`Packet::Ignored`].

use serde::Deserialize;

use crate::error::{ChatError, ChatResult};

/// Sent after the Engine.IO open packet to join the default namespace.
pub const CONNECT_PACKET: &str = "40";
/// Reply to a server ping.
pub const PONG_PACKET: &str = "3";

/// A decoded `42[...]` event: first array element is the name, the rest are arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub name: String,
    pub args: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open {
        sid: String,
        ping_interval_ms: u64,
        ping_timeout_ms: u64,
    },
    Close,
    Ping,
    Pong,
    Connect,
    ConnectError(String),
    Disconnect,
    Event(RawEvent),
    Ignored(char),
}

#[derive(Deserialize)]
struct OpenPayload {
    sid: String,
    #[serde(rename = "pingInterval", default)]
    ping_interval: u64,
    #[serde(rename = "pingTimeout", default)]
    ping_timeout: u64,
}

pub fn decode_packet(text: &str) -> ChatResult<Packet> {
    let mut chars = text.chars();
    let Some(engine_type) = chars.next() else {
        return Err(ChatError::Protocol("empty packet".into()));
    };
    let rest = chars.as_str();
    match engine_type {
        '0' => {
            let open: OpenPayload = serde_json::from_str(rest)?;
            Ok(Packet::Open {
                sid: open.sid,
                ping_interval_ms: open.ping_interval,
                ping_timeout_ms: open.ping_timeout,
            })
        }
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(rest),
        '5' | '6' => Ok(Packet::Ignored(engine_type)),
        other => Err(ChatError::Protocol(format!(
            "unknown engine.io packet type {other:?}"
        ))),
    }
}

fn decode_socket_packet(text: &str) -> ChatResult<Packet> {
    let mut chars = text.chars();
    let Some(socket_type) = chars.next() else {
        return Err(ChatError::Protocol("empty socket.io packet".into()));
    };
    let body = strip_namespace_and_ack(chars.as_str());
    match socket_type {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body).map(Packet::Event),
        '4' => Ok(Packet::ConnectError(body.to_string())),
        other => Ok(Packet::Ignored(other)),
    }
}

/// `/ns,12[...]` -> `[...]`
fn strip_namespace_and_ack(mut body: &str) -> &str {
    if body.starts_with('/') {
        body = match body.find(',') {
            Some(i) => &body[i + 1..],
            None => "",
        };
    }
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(body: &str) -> ChatResult<RawEvent> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let serde_json::Value::Array(mut items) = value else {
        return Err(ChatError::Protocol("event payload is not an array".into()));
    };
    if items.is_empty() {
        return Err(ChatError::Protocol("event without name".into()));
    }
    let serde_json::Value::String(name) = items.remove(0) else {
        return Err(ChatError::Protocol("event name is not a string".into()));
    };
    Ok(RawEvent { name, args: items })
}
