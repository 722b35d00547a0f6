#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Session
    StartSession {
        user_id: Option<String>,
    },
    EndSession,
    ReloadMessages,

    // Search
    SetSearchQuery {
        query: String,
    },
    SubmitSearch {
        query: String,
    },
    ClearSearchHistory,

    // Composer
    UpdateDraft {
        text: String,
    },
    UpdateDraftSender {
        sender: String,
    },
    SelectReplyTarget {
        message_id: String,
    },
    ClearReplyTarget,
    SubmitDraft,

    // Unread
    MarkSenderSeen {
        sender_id: String,
    },
    MarkAllSeen,
    RefreshNotifications,

    // UI
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes draft text or queries).
    pub fn tag(&self) -> &'static str {
        match self {
            // Session
            AppAction::StartSession { .. } => "StartSession",
            AppAction::EndSession => "EndSession",
            AppAction::ReloadMessages => "ReloadMessages",

            // Search
            AppAction::SetSearchQuery { .. } => "SetSearchQuery",
            AppAction::SubmitSearch { .. } => "SubmitSearch",
            AppAction::ClearSearchHistory => "ClearSearchHistory",

            // Composer
            AppAction::UpdateDraft { .. } => "UpdateDraft",
            AppAction::UpdateDraftSender { .. } => "UpdateDraftSender",
            AppAction::SelectReplyTarget { .. } => "SelectReplyTarget",
            AppAction::ClearReplyTarget => "ClearReplyTarget",
            AppAction::SubmitDraft => "SubmitDraft",

            // Unread
            AppAction::MarkSenderSeen { .. } => "MarkSenderSeen",
            AppAction::MarkAllSeen => "MarkAllSeen",
            AppAction::RefreshNotifications => "RefreshNotifications",

            // UI
            AppAction::ClearToast => "ClearToast",
        }
    }
}
