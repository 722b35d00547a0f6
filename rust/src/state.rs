/// Label used when a message or submission carries no sender name.
pub const ANONYMOUS_SENDER: &str = "Anonymous";

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatReply {
    pub sender: String,
    pub text: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub replies: Vec<ChatReply>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub read: bool,
    pub created_at: Option<i64>,
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub session: SessionState,
    pub busy: BusyState,
    /// Full reconciled log, ascending by `created_at`.
    pub messages: Vec<ChatMessage>,
    /// `messages` filtered by `search.query`. Derived, never edited directly.
    pub visible_messages: Vec<ChatMessage>,
    pub search: SearchState,
    pub composer: ComposerState,
    pub unread: UnreadState,
    pub notifications: NotificationState,
    pub stream: StreamStatus,
    pub toast: Option<Toast>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            session: SessionState::Inactive,
            busy: BusyState::idle(),
            messages: vec![],
            visible_messages: vec![],
            search: SearchState::empty(),
            composer: ComposerState::empty(),
            unread: UnreadState::empty(),
            notifications: NotificationState::empty(),
            stream: StreamStatus::Disconnected,
            toast: None,
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Active { user_id: Option<String> },
}

/// "In flight" flags for requests the UI should reflect with spinners.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub loading_messages: bool,
    pub sending: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            loading_messages: false,
            sending: false,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    /// Most recent first.
    pub history: Vec<String>,
}

impl SearchState {
    pub fn empty() -> Self {
        Self {
            query: String::new(),
            history: vec![],
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum ComposerPhase {
    Idle,
    Composing,
    Replying,
    Sending,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ComposerState {
    pub draft_text: String,
    pub draft_sender: Option<String>,
    pub reply_target: Option<String>,
    pub phase: ComposerPhase,
}

impl ComposerState {
    pub fn empty() -> Self {
        Self {
            draft_text: String::new(),
            draft_sender: None,
            reply_target: None,
            phase: ComposerPhase::Idle,
        }
    }

    /// Sender name used on the wire for the current draft.
    pub fn effective_sender(&self) -> String {
        self.draft_sender
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS_SENDER)
            .to_string()
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct UnreadSender {
    pub sender_id: String,
    pub sender_name: String,
    pub count: u32,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct UnreadState {
    /// Sorted by `sender_id`.
    pub senders: Vec<UnreadSender>,
    /// Direct messages received since the last mark-all.
    pub total: u32,
}

impl UnreadState {
    pub fn empty() -> Self {
        Self {
            senders: vec![],
            total: 0,
        }
    }

    pub fn count_for(&self, sender_id: &str) -> u32 {
        self.senders
            .iter()
            .find(|s| s.sender_id == sender_id)
            .map(|s| s.count)
            .unwrap_or(0)
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct NotificationState {
    pub unread_count: u32,
    /// Last fetch failed; `unread_count` is the last successful value.
    pub stale: bool,
    pub last_updated_at: Option<i64>,
}

impl NotificationState {
    pub fn empty() -> Self {
        Self {
            unread_count: 0,
            stale: false,
            last_updated_at: None,
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum ToastSeverity {
    Success,
    Error,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub severity: ToastSeverity,
}

pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
