#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use community_chat_core::{
    AppBackend, AppReconciler, AppState, AppUpdate, ChatApi, ChatError, ChatMessage, ChatReply,
    ChatResult, FfiApp, KvStore, MemoryKvStore, Notification, PushConnection, PushTransport,
    RawEvent,
};
use serde_json::json;
use tempfile::TempDir;

pub fn write_config(data_dir: &str, overrides: serde_json::Value) {
    let path = std::path::Path::new(data_dir).join("chat_config.json");
    let mut v = json!({
        "disable_network": false,
        "poll_interval_ms": 50,
        "poll_retry_base_ms": 10,
        "stream_reconnect_base_ms": 10,
        "stream_reconnect_max_ms": 40,
    });
    if let (Some(base), Some(extra)) = (v.as_object_mut(), overrides.as_object()) {
        for (k, val) in extra {
            base.insert(k.clone(), val.clone());
        }
    }
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

pub fn wait_until(what: &str, timeout: Duration, mut f: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub struct TestReconciler {
    updates: Arc<Mutex<Vec<AppUpdate>>>,
}

impl TestReconciler {
    pub fn new() -> (Self, Arc<Mutex<Vec<AppUpdate>>>) {
        let updates = Arc::new(Mutex::new(vec![]));
        (
            Self {
                updates: updates.clone(),
            },
            updates,
        )
    }
}

impl AppReconciler for TestReconciler {
    fn reconcile(&self, update: AppUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

pub fn msg(id: &str, text: &str, created_at: i64) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        text: text.to_string(),
        sender: "tester".to_string(),
        created_at,
        replies: vec![],
    }
}

pub fn reply(sender: &str, text: &str, created_at: i64) -> ChatReply {
    ChatReply {
        sender: sender.to_string(),
        text: text.to_string(),
        created_at,
    }
}

pub fn chat_event(id: &str, text: &str, created_at: i64) -> RawEvent {
    RawEvent {
        name: "chatMessage".into(),
        args: vec![json!({
            "_id": id,
            "text": text,
            "sender": "tester",
            "createdAt": created_at,
        })],
    }
}

pub fn direct_event(sender_id: &str, sender_name: &str, content: &str) -> RawEvent {
    RawEvent {
        name: "receive-message".into(),
        args: vec![json!(sender_id), json!(sender_name), json!(content)],
    }
}

pub fn notification(id: &str, read: bool) -> Notification {
    Notification {
        id: id.to_string(),
        read,
        created_at: None,
    }
}

pub fn ids(messages: &[ChatMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentCall {
    Message {
        text: String,
        sender: String,
    },
    Reply {
        message_id: String,
        text: String,
        sender: String,
    },
}

/// REST double. Snapshot and submit calls block until the test feeds a response,
/// so tests control ordering against push events.
pub struct ScriptedApi {
    snapshot_tx: flume::Sender<ChatResult<Vec<ChatMessage>>>,
    snapshot_rx: flume::Receiver<ChatResult<Vec<ChatMessage>>>,
    submit_tx: flume::Sender<ChatResult<()>>,
    submit_rx: flume::Receiver<ChatResult<()>>,
    sent: Mutex<Vec<SentCall>>,
    notifications: Mutex<VecDeque<ChatResult<Vec<Notification>>>>,
    notification_fetches: AtomicUsize,
    notification_users: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        let (snapshot_tx, snapshot_rx) = flume::unbounded();
        let (submit_tx, submit_rx) = flume::unbounded();
        Arc::new(Self {
            snapshot_tx,
            snapshot_rx,
            submit_tx,
            submit_rx,
            sent: Mutex::new(vec![]),
            notifications: Mutex::new(VecDeque::new()),
            notification_fetches: AtomicUsize::new(0),
            notification_users: Mutex::new(vec![]),
        })
    }

    pub fn respond_snapshot(&self, result: ChatResult<Vec<ChatMessage>>) {
        self.snapshot_tx.send(result).unwrap();
    }

    pub fn respond_submit(&self, result: ChatResult<()>) {
        self.submit_tx.send(result).unwrap();
    }

    pub fn sent(&self) -> Vec<SentCall> {
        self.sent.lock().unwrap().clone()
    }

    pub fn script_notifications(&self, result: ChatResult<Vec<Notification>>) {
        self.notifications.lock().unwrap().push_back(result);
    }

    pub fn notification_fetches(&self) -> usize {
        self.notification_fetches.load(Ordering::SeqCst)
    }

    pub fn notification_users(&self) -> Vec<String> {
        self.notification_users.lock().unwrap().clone()
    }
}

fn transport_err(what: &str) -> ChatError {
    ChatError::Transport(what.to_string())
}

#[async_trait]
impl ChatApi for ScriptedApi {
    async fn fetch_messages(&self) -> ChatResult<Vec<ChatMessage>> {
        self.snapshot_rx
            .recv_async()
            .await
            .unwrap_or_else(|_| Err(transport_err("snapshot script closed")))
    }

    async fn send_message(&self, text: &str, sender: &str) -> ChatResult<()> {
        self.sent.lock().unwrap().push(SentCall::Message {
            text: text.to_string(),
            sender: sender.to_string(),
        });
        self.submit_rx
            .recv_async()
            .await
            .unwrap_or_else(|_| Err(transport_err("submit script closed")))
    }

    async fn send_reply(&self, message_id: &str, text: &str, sender: &str) -> ChatResult<()> {
        self.sent.lock().unwrap().push(SentCall::Reply {
            message_id: message_id.to_string(),
            text: text.to_string(),
            sender: sender.to_string(),
        });
        self.submit_rx
            .recv_async()
            .await
            .unwrap_or_else(|_| Err(transport_err("submit script closed")))
    }

    async fn fetch_notifications(&self, user_id: &str) -> ChatResult<Vec<Notification>> {
        self.notification_fetches.fetch_add(1, Ordering::SeqCst);
        self.notification_users
            .lock()
            .unwrap()
            .push(user_id.to_string());
        let next = self.notifications.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(transport_err("no scripted notifications")))
    }
}

/// Push double. Each `add_connection` queues one successful connect; the returned
/// sender feeds that connection and dropping it closes the channel server-side.
pub struct ScriptedPush {
    pending: Mutex<VecDeque<flume::Receiver<RawEvent>>>,
    connects: AtomicUsize,
    drops: Arc<AtomicUsize>,
}

impl ScriptedPush {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
            drops: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn add_connection(&self) -> flume::Sender<RawEvent> {
        let (tx, rx) = flume::unbounded();
        self.pending.lock().unwrap().push_back(rx);
        tx
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for ScriptedPush {
    async fn connect(&self) -> ChatResult<Box<dyn PushConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.pending.lock().unwrap().pop_front();
        match next {
            Some(rx) => Ok(Box::new(ScriptedConnection {
                rx,
                drops: self.drops.clone(),
            })),
            None => Err(transport_err("no scripted connection")),
        }
    }
}

struct ScriptedConnection {
    rx: flume::Receiver<RawEvent>,
    drops: Arc<AtomicUsize>,
}

#[async_trait]
impl PushConnection for ScriptedConnection {
    async fn next_event(&mut self) -> ChatResult<Option<RawEvent>> {
        Ok(self.rx.recv_async().await.ok())
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub app: Arc<FfiApp>,
    pub api: Arc<ScriptedApi>,
    pub push: Arc<ScriptedPush>,
    pub store: Arc<dyn KvStore>,
    pub updates: Arc<Mutex<Vec<AppUpdate>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(json!({}))
    }

    pub fn with_config(overrides: serde_json::Value) -> Self {
        Self::with_store(overrides, Arc::new(MemoryKvStore::new()))
    }

    pub fn with_store(overrides: serde_json::Value, store: Arc<dyn KvStore>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path().to_str().unwrap(), overrides);
        Self::in_dir(dir, store)
    }

    pub fn in_dir(dir: TempDir, store: Arc<dyn KvStore>) -> Self {
        let api = ScriptedApi::new();
        let push = ScriptedPush::new();
        let app = FfiApp::with_backend(
            dir.path().to_string_lossy().to_string(),
            AppBackend {
                api: api.clone(),
                push: push.clone(),
                store: store.clone(),
            },
        );
        let (reconciler, updates) = TestReconciler::new();
        app.listen_for_updates(Box::new(reconciler));
        Self {
            dir,
            app,
            api,
            push,
            store,
            updates,
        }
    }

    pub fn state(&self) -> AppState {
        self.app.state()
    }

    pub fn wait(&self, what: &str, mut f: impl FnMut(&AppState) -> bool) {
        wait_until(what, Duration::from_secs(3), || f(&self.app.state()));
    }
}
