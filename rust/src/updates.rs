use crate::error::ChatError;
use crate::state::{AppState, ChatMessage, Notification, StreamStatus};
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
    Shutdown,
}

/// Results posted back by async tasks. `session` is the token of the session that
/// spawned the task; events from an ended session are dropped.
#[derive(Debug)]
pub enum InternalEvent {
    // Snapshot
    SnapshotFetched {
        session: u64,
        result: Result<Vec<ChatMessage>, ChatError>,
    },

    // Push channel
    StreamStatusChanged {
        session: u64,
        status: StreamStatus,
    },
    ChatMessagePushed {
        session: u64,
        message: ChatMessage,
    },
    DirectMessageReceived {
        session: u64,
        sender_id: String,
        sender_name: String,
    },

    // Composer
    SubmitResult {
        session: u64,
        token: u64,
        result: Result<(), ChatError>,
    },

    // Notification poller
    NotificationsFetched {
        session: u64,
        result: Result<Vec<Notification>, ChatError>,
    },
}

impl InternalEvent {
    pub fn session(&self) -> u64 {
        match self {
            InternalEvent::SnapshotFetched { session, .. }
            | InternalEvent::StreamStatusChanged { session, .. }
            | InternalEvent::ChatMessagePushed { session, .. }
            | InternalEvent::DirectMessageReceived { session, .. }
            | InternalEvent::SubmitResult { session, .. }
            | InternalEvent::NotificationsFetched { session, .. } => *session,
        }
    }
}
