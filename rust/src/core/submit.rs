use super::AppCore;
use crate::composer::{SubmissionKind, SubmitRejection};
use crate::error::ChatError;
use crate::state::ToastSeverity;
use crate::updates::{CoreMsg, InternalEvent};

const TOAST_EMPTY_DRAFT: &str = "Enter a message first.";
const TOAST_NO_SESSION: &str = "Chat is not connected.";

fn outcome_toast(kind: &SubmissionKind, ok: bool) -> &'static str {
    match (kind, ok) {
        (SubmissionKind::Message, true) => "Message sent!",
        (SubmissionKind::Reply { .. }, true) => "Reply sent!",
        (SubmissionKind::Message, false) => "Failed to send message.",
        (SubmissionKind::Reply { .. }, false) => "Failed to send reply.",
    }
}

impl AppCore {
    pub(super) fn submit_draft(&mut self) {
        let Some(session) = self.current_token() else {
            self.toast(TOAST_NO_SESSION, ToastSeverity::Error);
            return;
        };

        let submission = match self.composer.begin_submit() {
            Ok(s) => s,
            Err(SubmitRejection::AlreadySending) => {
                tracing::debug!("submit ignored; already sending");
                return;
            }
            Err(SubmitRejection::EmptyDraft) => {
                self.toast(TOAST_EMPTY_DRAFT, ToastSeverity::Error);
                return;
            }
        };
        let token = submission.token;
        tracing::info!(
            token,
            reply = matches!(submission.kind, SubmissionKind::Reply { .. }),
            "submitting draft"
        );

        self.pending_submit = Some(submission.clone());
        self.set_busy(|b| b.sending = true);
        self.sync_composer();
        self.emit_state();

        if !self.network_enabled() {
            self.handle_submit_result(token, Err(ChatError::Transport("network disabled".into())));
            return;
        }

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = match &submission.kind {
                SubmissionKind::Message => {
                    api.send_message(&submission.text, &submission.sender).await
                }
                SubmissionKind::Reply { message_id } => {
                    api.send_reply(message_id, &submission.text, &submission.sender)
                        .await
                }
            };
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SubmitResult {
                session,
                token,
                result,
            })));
        });
    }

    pub(super) fn handle_submit_result(&mut self, token: u64, result: Result<(), ChatError>) {
        let ok = result.is_ok();
        if !self.composer.finish_submit(token, ok) {
            tracing::debug!(token, "stale submit result");
            return;
        }
        let Some(submission) = self.pending_submit.take() else {
            return;
        };
        self.set_busy(|b| b.sending = false);
        self.sync_composer();

        // The acknowledgement carries no message; the pushed copy lands in the log.
        match result {
            Ok(()) => {
                tracing::info!(token, "submit acknowledged");
                self.toast(outcome_toast(&submission.kind, true), ToastSeverity::Success);
            }
            Err(e) => {
                tracing::warn!(token, %e, "submit failed");
                self.toast(outcome_toast(&submission.kind, false), ToastSeverity::Error);
            }
        }
    }
}
