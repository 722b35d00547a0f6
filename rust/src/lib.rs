mod actions;
mod backoff;
mod composer;
mod core;
mod error;
mod log_store;
mod logging;
mod persist;
mod search;
mod state;
mod transport;
mod unread;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use crate::core::AppBackend;
pub use actions::AppAction;
pub use backoff::{jittered, Backoff};
pub use composer::{Composer, Submission, SubmissionKind, SubmitRejection};
pub use error::{ChatError, ChatResult};
pub use log_store::{IngestOutcome, LogStore};
pub use persist::{JsonFileKvStore, KvStore, MemoryKvStore};
pub use search::{filter_messages, SearchHistory, SEARCH_HISTORY_LIMIT};
pub use state::*;
pub use transport::{
    socketio, wire, ChatApi, HttpChatApi, PushConnection, PushEvent, PushTransport, RawEvent,
    WebSocketPushTransport, EVENT_CHAT_MESSAGE, EVENT_RECEIVE_MESSAGE,
};
pub use unread::UnreadTracker;
pub use updates::*;

/// Return the default `chat_config.json` payload used when no config file exists.
pub fn default_config_json() -> String {
    core::default_app_config_json()
}

/// Production backend for `data_dir`: REST + socket.io clients built from
/// `chat_config.json` and a file-backed key/value store.
pub fn default_backend(data_dir: &str) -> ChatResult<AppBackend> {
    let config = core::load_app_config(data_dir);
    let api = HttpChatApi::new(&config.api_base_url(), config.request_timeout())?;
    Ok(AppBackend {
        api: Arc::new(api),
        push: Arc::new(WebSocketPushTransport::new(config.stream_url())),
        store: Arc::new(JsonFileKvStore::open(data_dir)),
    })
}

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
}

#[uniffi::export]
impl FfiApp {
    #[uniffi::constructor]
    pub fn new(data_dir: String) -> Arc<Self> {
        let backend = match default_backend(&data_dir) {
            Ok(backend) => backend,
            Err(e) => {
                // Only the HTTP client builder can fail here; keep the app usable offline.
                tracing::error!(%e, "failed to build network backend; using offline store only");
                AppBackend {
                    api: Arc::new(OfflineChatApi),
                    push: Arc::new(OfflineChatApi),
                    store: Arc::new(JsonFileKvStore::open(&data_dir)),
                }
            }
        };
        Self::with_backend(data_dir, backend)
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }
}

impl FfiApp {
    /// Not exposed over UniFFI; tests and the CLI inject their own I/O here.
    pub fn with_backend(data_dir: String, backend: AppBackend) -> Arc<Self> {
        let config = core::load_app_config(&data_dir);
        logging::init_logging(&data_dir, config.log_to_file == Some(true));
        tracing::info!(data_dir = %data_dir, "FfiApp starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                config,
                shared_for_core,
                backend,
            );
            while let Ok(msg) = core_rx.recv() {
                let shutdown = matches!(msg, CoreMsg::Shutdown);
                core.handle_message(msg);
                if shutdown {
                    break;
                }
            }
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
        })
    }
}

impl Drop for FfiApp {
    fn drop(&mut self) {
        let _ = self.core_tx.send(CoreMsg::Shutdown);
    }
}

/// Stand-in used only when the HTTP client cannot be constructed.
struct OfflineChatApi;

#[async_trait::async_trait]
impl ChatApi for OfflineChatApi {
    async fn fetch_messages(&self) -> ChatResult<Vec<ChatMessage>> {
        Err(ChatError::Transport("network backend unavailable".into()))
    }

    async fn send_message(&self, _text: &str, _sender: &str) -> ChatResult<()> {
        Err(ChatError::Transport("network backend unavailable".into()))
    }

    async fn send_reply(&self, _message_id: &str, _text: &str, _sender: &str) -> ChatResult<()> {
        Err(ChatError::Transport("network backend unavailable".into()))
    }

    async fn fetch_notifications(&self, _user_id: &str) -> ChatResult<Vec<Notification>> {
        Err(ChatError::Transport("network backend unavailable".into()))
    }
}

#[async_trait::async_trait]
impl PushTransport for OfflineChatApi {
    async fn connect(&self) -> ChatResult<Box<dyn PushConnection>> {
        Err(ChatError::Transport("network backend unavailable".into()))
    }
}
