use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::socketio::{self, Packet, RawEvent};
use super::{PushConnection, PushTransport};
use crate::error::{ChatError, ChatResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket.IO-over-websocket subscriber, e.g.
/// `wss://host/socket.io/?EIO=4&transport=websocket`.
#[derive(Debug, Clone)]
pub struct WebSocketPushTransport {
    url: String,
}

impl WebSocketPushTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PushTransport for WebSocketPushTransport {
    async fn connect(&self) -> ChatResult<Box<dyn PushConnection>> {
        let (ws, _resp) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        let mut conn = WebSocketPushConnection {
            ws,
            heartbeat: None,
        };
        conn.handshake().await?;
        tracing::info!(url = %self.url, "push channel connected");
        Ok(Box::new(conn))
    }
}

struct WebSocketPushConnection {
    ws: WsStream,
    /// `pingInterval + pingTimeout` from the open packet. Silence longer than
    /// this means the server is gone even if the socket is still open.
    heartbeat: Option<Duration>,
}

impl WebSocketPushConnection {
    async fn send_text(&mut self, text: &str) -> ChatResult<()> {
        self.ws.send(Message::text(text.to_string())).await?;
        Ok(())
    }

    /// Engine.IO open, then namespace connect.
    async fn handshake(&mut self) -> ChatResult<()> {
        let mut namespace_requested = false;
        loop {
            let Some(packet) = self.next_packet().await? else {
                return Err(ChatError::Transport("closed during handshake".into()));
            };
            match packet {
                Packet::Open {
                    sid,
                    ping_interval_ms,
                    ping_timeout_ms,
                } => {
                    tracing::debug!(%sid, ping_interval_ms, ping_timeout_ms, "engine.io open");
                    let window = ping_interval_ms.saturating_add(ping_timeout_ms);
                    self.heartbeat = (window > 0).then(|| Duration::from_millis(window));
                    self.send_text(socketio::CONNECT_PACKET).await?;
                    namespace_requested = true;
                }
                Packet::Ping => self.send_text(socketio::PONG_PACKET).await?,
                Packet::Connect if namespace_requested => return Ok(()),
                Packet::ConnectError(detail) => {
                    return Err(ChatError::Protocol(format!("namespace refused: {detail}")))
                }
                Packet::Close | Packet::Disconnect => {
                    return Err(ChatError::Transport("closed during handshake".into()))
                }
                other => tracing::debug!(?other, "ignoring packet during handshake"),
            }
        }
    }

    /// Next decodable packet. Undecodable text frames are logged and skipped.
    /// Fails once the heartbeat window passes without any frame.
    async fn next_packet(&mut self) -> ChatResult<Option<Packet>> {
        loop {
            let frame = match self.heartbeat {
                Some(window) => tokio::time::timeout(window, self.ws.next())
                    .await
                    .map_err(|_| ChatError::Transport("ping timeout".into()))?,
                None => self.ws.next().await,
            };
            let Some(frame) = frame else {
                return Ok(None);
            };
            match frame? {
                Message::Text(text) => match socketio::decode_packet(text.as_str()) {
                    Ok(packet) => return Ok(Some(packet)),
                    Err(e) => tracing::warn!(%e, "dropping malformed push packet"),
                },
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
    }
}

#[async_trait]
impl PushConnection for WebSocketPushConnection {
    async fn next_event(&mut self) -> ChatResult<Option<RawEvent>> {
        loop {
            let Some(packet) = self.next_packet().await? else {
                return Ok(None);
            };
            match packet {
                Packet::Event(ev) => return Ok(Some(ev)),
                Packet::Ping => self.send_text(socketio::PONG_PACKET).await?,
                Packet::Close | Packet::Disconnect => return Ok(None),
                Packet::ConnectError(detail) => {
                    return Err(ChatError::Protocol(format!("namespace error: {detail}")))
                }
                _ => {}
            }
        }
    }
}
