use std::time::Duration;

use community_chat_core::{
    ChatApi, ChatError, HttpChatApi, PushEvent, PushTransport, WebSocketPushTransport,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

// ── socket.io push channel ──────────────────────────────────────────────────

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    while let Some(frame) = ws.next().await {
        if let Message::Text(t) = frame.unwrap() {
            return t.as_str().to_string();
        }
    }
    panic!("websocket closed before a text frame");
}

async fn send_text(ws: &mut WebSocketStream<TcpStream>, text: &str) {
    ws.send(Message::text(text.to_string())).await.unwrap();
}

const OPEN: &str = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

#[tokio::test]
async fn socketio_handshake_events_and_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(sock).await.unwrap();
        send_text(&mut ws, OPEN).await;
        assert_eq!(next_text(&mut ws).await, "40");
        send_text(&mut ws, r#"40{"sid":"def"}"#).await;

        send_text(&mut ws, "2").await;
        send_text(
            &mut ws,
            r#"42["chatMessage",{"_id":"1","text":"hi","sender":"ana","createdAt":"2024-05-01T10:00:00.000Z"}]"#,
        )
        .await;
        assert_eq!(next_text(&mut ws).await, "3");

        send_text(&mut ws, "not a packet").await;
        send_text(&mut ws, r#"42["receive-message","u1","Ana","hello"]"#).await;
        send_text(&mut ws, "41").await;
        // Hold the socket until the client goes away.
        let _ = ws.next().await;
    });

    let transport = WebSocketPushTransport::new(format!(
        "ws://{addr}/socket.io/?EIO=4&transport=websocket"
    ));
    let mut conn = transport.connect().await.unwrap();

    let first = PushEvent::decode(conn.next_event().await.unwrap().unwrap()).unwrap();
    let PushEvent::ChatMessage(message) = first else {
        panic!("expected chat message, got {first:?}");
    };
    assert_eq!(message.id, "1");
    assert_eq!(message.sender, "ana");
    assert_eq!(message.created_at, 1_714_557_600_000);

    let second = PushEvent::decode(conn.next_event().await.unwrap().unwrap()).unwrap();
    assert_eq!(
        second,
        PushEvent::DirectMessage {
            sender_id: "u1".into(),
            sender_name: "Ana".into(),
            content: "hello".into(),
        }
    );

    assert!(conn.next_event().await.unwrap().is_none());
    drop(conn);
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn refused_namespace_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(sock).await.unwrap();
        send_text(&mut ws, OPEN).await;
        assert_eq!(next_text(&mut ws).await, "40");
        send_text(&mut ws, r#"44{"message":"unauthorized"}"#).await;
        let _ = ws.next().await;
    });

    let transport = WebSocketPushTransport::new(format!("ws://{addr}/socket.io/"));
    match transport.connect().await {
        Err(ChatError::Protocol(detail)) => assert!(detail.contains("unauthorized")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("connect should fail"),
    }
}

#[tokio::test]
async fn silent_server_trips_heartbeat_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(sock).await.unwrap();
        send_text(
            &mut ws,
            r#"0{"sid":"abc","upgrades":[],"pingInterval":100,"pingTimeout":100}"#,
        )
        .await;
        assert_eq!(next_text(&mut ws).await, "40");
        send_text(&mut ws, r#"40{"sid":"def"}"#).await;
        // No pings from here on; keep the socket open until the client leaves.
        let _ = ws.next().await;
    });

    let transport = WebSocketPushTransport::new(format!("ws://{addr}/socket.io/"));
    let mut conn = transport.connect().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), conn.next_event())
        .await
        .expect("half-open channel was never detected");
    match result {
        Err(ChatError::Transport(detail)) => assert!(detail.contains("ping timeout")),
        other => panic!("expected ping timeout, got {other:?}"),
    }
    drop(conn);
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}

// ── REST client ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct CapturedRequest {
    request_line: String,
    body: String,
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Answers one request per connection with the given status line and JSON body.
async fn serve(listener: TcpListener, responses: Vec<(&'static str, String)>) -> Vec<CapturedRequest> {
    let mut captured = vec![];
    for (status, body) in responses {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let (head_end, content_len) = loop {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find_head_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                let len = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break (pos + 4, len);
            }
        };
        while buf.len() < head_end + content_len {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed mid-body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        captured.push(CapturedRequest {
            request_line: head.lines().next().unwrap_or_default().to_string(),
            body: String::from_utf8_lossy(&buf[head_end..head_end + content_len]).to_string(),
        });

        let resp = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(resp.as_bytes()).await.unwrap();
        let _ = sock.shutdown().await;
    }
    captured
}

async fn api_with(
    responses: Vec<(&'static str, String)>,
) -> (HttpChatApi, tokio::task::JoinHandle<Vec<CapturedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener, responses));
    let api = HttpChatApi::new(&format!("http://{addr}/api/"), Duration::from_secs(5)).unwrap();
    (api, server)
}

#[tokio::test]
async fn fetch_messages_skips_malformed_entries() {
    let body = json!([
        {"_id": "1", "text": "hello", "sender": "ana", "createdAt": "2024-05-01T10:00:00.000Z",
         "replies": [{"sender": "bo", "message": "hey", "createdAt": "2024-05-01T10:01:00.000Z"}]},
        {"text": "no id", "createdAt": 5},
        {"_id": "2", "text": "anon", "createdAt": 1714557700000i64},
    ])
    .to_string();
    let (api, server) = api_with(vec![("200 OK", body)]).await;

    let messages = api.fetch_messages().await.unwrap();
    let requests = server.await.unwrap();

    assert_eq!(requests[0].request_line, "GET /api/chat/messages HTTP/1.1");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].replies[0].text, "hey");
    assert_eq!(messages[0].replies[0].created_at, 1_714_557_660_000);
    assert_eq!(messages[1].sender, "Anonymous");
}

#[tokio::test]
async fn send_and_reply_bodies() {
    let (api, server) = api_with(vec![
        ("200 OK", r#"{"ok":true}"#.to_string()),
        ("201 Created", "{}".to_string()),
    ])
    .await;

    api.send_message("hello all", "Anonymous").await.unwrap();
    api.send_reply("abc", "thanks", "mara").await.unwrap();
    let requests = server.await.unwrap();

    assert_eq!(requests[0].request_line, "POST /api/chat/send HTTP/1.1");
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&requests[0].body).unwrap(),
        json!({"message": "hello all", "sender": "Anonymous"})
    );
    assert_eq!(requests[1].request_line, "POST /api/chat/reply HTTP/1.1");
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&requests[1].body).unwrap(),
        json!({"messageId": "abc", "reply": {"message": "thanks"}, "sender": "mara"})
    );
}

#[tokio::test]
async fn error_status_is_reported_with_endpoint() {
    let (api, server) = api_with(vec![(
        "500 Internal Server Error",
        r#"{"error":"boom"}"#.to_string(),
    )])
    .await;

    let err = api.send_message("hi", "Anonymous").await.unwrap_err();
    server.await.unwrap();
    match err {
        ChatError::Status { endpoint, status } => {
            assert_eq!(endpoint, "/chat/send");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn notifications_count_unread() {
    let body = json!([
        {"_id": "n1", "read": false},
        {"_id": "n2", "read": true},
        {"_id": "n3"},
    ])
    .to_string();
    let (api, server) = api_with(vec![("200 OK", body), ("200 OK", "[]".to_string())]).await;

    assert!(matches!(
        api.fetch_notifications("a/b").await,
        Err(ChatError::InvalidInput(_))
    ));
    let list = api.fetch_notifications("user-1").await.unwrap();
    let odd = api.fetch_notifications("ana?x#1%").await.unwrap();
    let requests = server.await.unwrap();

    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].request_line, "GET /api/notifications/user-1 HTTP/1.1");
    assert_eq!(
        requests[1].request_line,
        "GET /api/notifications/ana%3Fx%231%25 HTTP/1.1"
    );
    assert!(odd.is_empty());
    assert_eq!(community_chat_core::wire::unread_notification_count(&list), 2);
}
