mod config;
mod poller;
mod session;
mod storage;
mod submit;

use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::composer::{Composer, Submission};
use crate::log_store::LogStore;
use crate::persist::KvStore;
use crate::search::{filter_messages, SearchHistory};
use crate::state::{
    now_millis, AppState, BusyState, NotificationState, SessionState, StreamStatus, Toast,
    ToastSeverity,
};
use crate::transport::wire::unread_notification_count;
use crate::transport::{ChatApi, PushTransport};
use crate::unread::UnreadTracker;
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

pub(crate) use config::{default_app_config_json, load_app_config, AppConfig};

use session::Session;

const TOAST_LOAD_FAILED: &str = "Failed to load messages.";

/// I/O implementations handed to the core. Production builds use the HTTP/websocket
/// transports and a file-backed store; tests and the CLI can inject their own.
#[derive(Clone)]
pub struct AppBackend {
    pub api: Arc<dyn ChatApi>,
    pub push: Arc<dyn PushTransport>,
    pub store: Arc<dyn KvStore>,
}

pub struct AppCore {
    pub state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    config: AppConfig,
    runtime: tokio::runtime::Runtime,

    api: Arc<dyn ChatApi>,
    push: Arc<dyn PushTransport>,
    store: Arc<dyn KvStore>,

    session: Option<Session>,
    // Bumped on every start/stop; async results carry the value they were spawned with.
    session_token: u64,

    log: LogStore,
    composer: Composer,
    pending_submit: Option<Submission>,
    unread: UnreadTracker,
    search_history: SearchHistory,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        config: AppConfig,
        shared_state: Arc<RwLock<AppState>>,
        backend: AppBackend,
    ) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let mut this = Self {
            state: AppState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            config,
            runtime,
            api: backend.api,
            push: backend.push,
            store: backend.store,
            session: None,
            session_token: 0,
            log: LogStore::new(),
            composer: Composer::new(),
            pending_submit: None,
            unread: UnreadTracker::new(),
            search_history: SearchHistory::new(),
        };
        this.load_search_history();

        // Ensure FfiApp.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>, severity: ToastSeverity) {
        // Kept in state until the UI clears it, so a state() resync still shows it.
        self.state.toast = Some(Toast {
            message: msg.into(),
            severity,
        });
        self.emit_state();
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) -> bool {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next == self.state.busy {
            return false;
        }
        self.state.busy = next;
        true
    }

    fn current_token(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.token)
    }

    fn sync_log(&mut self) {
        self.state.messages = self.log.messages().to_vec();
        self.refresh_visible();
    }

    fn refresh_visible(&mut self) {
        self.state.visible_messages = filter_messages(self.log.messages(), &self.state.search.query);
    }

    fn sync_composer(&mut self) {
        self.state.composer = self.composer.state().clone();
    }

    fn sync_unread(&mut self) {
        self.state.unread = self.unread.snapshot();
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: it carries draft text and queries.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
            CoreMsg::Shutdown => {
                tracing::info!("core shutting down");
                self.stop_session();
            }
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::StartSession { user_id } => {
                let user_id = user_id
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty());
                self.start_session(user_id);
                self.emit_state();
            }
            AppAction::EndSession => {
                if self.session.is_none() {
                    return;
                }
                self.stop_session();
                self.emit_state();
            }
            AppAction::ReloadMessages => {
                let Some(token) = self.current_token() else {
                    tracing::debug!("reload without active session");
                    return;
                };
                if self.state.busy.loading_messages {
                    return;
                }
                self.spawn_snapshot_fetch(token);
                self.emit_state();
            }

            AppAction::SetSearchQuery { query } => {
                if self.state.search.query == query {
                    return;
                }
                self.state.search.query = query;
                self.refresh_visible();
                self.emit_state();
            }
            AppAction::SubmitSearch { query } => {
                let recorded = self.search_history.record(&query);
                if recorded {
                    self.save_search_history();
                    self.state.search.history = self.search_history.entries().to_vec();
                }
                let query_changed = self.state.search.query != query;
                if query_changed {
                    self.state.search.query = query;
                    self.refresh_visible();
                }
                if recorded || query_changed {
                    self.emit_state();
                }
            }
            AppAction::ClearSearchHistory => {
                if !self.search_history.clear() {
                    return;
                }
                self.save_search_history();
                self.state.search.history.clear();
                self.emit_state();
            }

            AppAction::UpdateDraft { text } => {
                self.composer.update_draft(text);
                self.sync_composer();
                self.emit_state();
            }
            AppAction::UpdateDraftSender { sender } => {
                self.composer.update_sender(sender);
                self.sync_composer();
                self.emit_state();
            }
            AppAction::SelectReplyTarget { message_id } => {
                if !self.log.contains(&message_id) {
                    tracing::warn!(message_id = %message_id, "reply target not in log");
                }
                self.composer.select_reply_target(message_id);
                self.sync_composer();
                self.emit_state();
            }
            AppAction::ClearReplyTarget => {
                self.composer.clear_reply_target();
                self.sync_composer();
                self.emit_state();
            }
            AppAction::SubmitDraft => self.submit_draft(),

            AppAction::MarkSenderSeen { sender_id } => {
                if self.unread.mark_seen(&sender_id) {
                    self.sync_unread();
                    self.emit_state();
                }
            }
            AppAction::MarkAllSeen => {
                if self.unread.mark_all_seen() {
                    self.sync_unread();
                    self.emit_state();
                }
            }
            AppAction::RefreshNotifications => {
                match self.session.as_ref() {
                    Some(session) if session.user_id.is_some() => session.poll_trigger.notify_one(),
                    _ => tracing::debug!("no notification poller running"),
                }
            }

            AppAction::ClearToast => {
                if self.state.toast.take().is_some() {
                    self.emit_state();
                }
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        if self.current_token() != Some(internal.session()) {
            tracing::debug!(
                event_session = internal.session(),
                current = ?self.current_token(),
                "dropping event from ended session"
            );
            return;
        }

        match internal {
            InternalEvent::SnapshotFetched { result, .. } => {
                self.set_busy(|b| b.loading_messages = false);
                match result {
                    Ok(messages) => {
                        let fetched = messages.len();
                        let changed = self.log.ingest_all(messages);
                        tracing::info!(fetched, changed, total = self.log.len(), "snapshot ingested");
                        self.sync_log();
                        self.emit_state();
                    }
                    Err(e) => {
                        tracing::warn!(%e, "snapshot fetch failed");
                        self.toast(TOAST_LOAD_FAILED, ToastSeverity::Error);
                    }
                }
            }

            InternalEvent::StreamStatusChanged { status, .. } => {
                if self.state.stream != status {
                    tracing::debug!(?status, "stream status");
                    self.state.stream = status;
                    self.emit_state();
                }
            }
            InternalEvent::ChatMessagePushed { message, .. } => {
                let id = message.id.clone();
                let outcome = self.log.ingest(message);
                tracing::debug!(id = %id, ?outcome, "pushed message");
                if outcome.changed() {
                    self.sync_log();
                    self.emit_state();
                }
            }
            InternalEvent::DirectMessageReceived {
                sender_id,
                sender_name,
                ..
            } => {
                let count = self.unread.on_direct_message(&sender_id, &sender_name);
                tracing::debug!(sender_id = %sender_id, count, "direct message");
                self.sync_unread();
                self.emit_state();
            }

            InternalEvent::SubmitResult { token, result, .. } => {
                self.handle_submit_result(token, result);
            }

            InternalEvent::NotificationsFetched { result, .. } => {
                let next = match result {
                    Ok(list) => NotificationState {
                        unread_count: unread_notification_count(&list),
                        stale: false,
                        last_updated_at: Some(now_millis()),
                    },
                    Err(e) => {
                        tracing::warn!(%e, "notification fetch failed");
                        NotificationState {
                            stale: true,
                            ..self.state.notifications.clone()
                        }
                    }
                };
                if next != self.state.notifications {
                    self.state.notifications = next;
                    self.emit_state();
                }
            }
        }
    }

    fn reset_session_state(&mut self) {
        self.log = LogStore::new();
        self.composer = Composer::new();
        self.pending_submit = None;
        self.unread = UnreadTracker::new();
        self.state.session = SessionState::Inactive;
        self.state.busy = BusyState::idle();
        self.state.notifications = NotificationState::empty();
        self.state.stream = StreamStatus::Disconnected;
        self.sync_log();
        self.sync_composer();
        self.sync_unread();
    }
}
