// Outgoing draft + reply target state machine.

use crate::state::{ComposerPhase, ComposerState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionKind {
    Message,
    Reply { message_id: String },
}

/// A submission handed to the network layer. `token` ties the result back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub token: u64,
    pub kind: SubmissionKind,
    pub text: String,
    pub sender: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    AlreadySending,
    EmptyDraft,
}

/// Draft as it stood when the in-flight submission started.
#[derive(Debug, Clone)]
struct InFlight {
    token: u64,
    draft_text: String,
    reply_target: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Composer {
    state: ComposerState,
    in_flight: Option<InFlight>,
    next_token: u64,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self {
            state: ComposerState::empty(),
            in_flight: None,
            next_token: 0,
        }
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn update_draft(&mut self, text: String) {
        self.state.draft_text = text;
        self.settle_phase();
    }

    pub fn update_sender(&mut self, sender: String) {
        self.state.draft_sender = if sender.is_empty() {
            None
        } else {
            Some(sender)
        };
    }

    /// Allowed while sending; the in-flight submission keeps its own target.
    pub fn select_reply_target(&mut self, message_id: String) {
        self.state.reply_target = Some(message_id);
        self.state.draft_text.clear();
        self.settle_phase();
    }

    pub fn clear_reply_target(&mut self) {
        self.state.reply_target = None;
        self.settle_phase();
    }

    pub fn begin_submit(&mut self) -> Result<Submission, SubmitRejection> {
        if self.in_flight.is_some() {
            return Err(SubmitRejection::AlreadySending);
        }
        let text = self.state.draft_text.trim().to_string();
        if text.is_empty() {
            return Err(SubmitRejection::EmptyDraft);
        }
        self.next_token = self.next_token.wrapping_add(1);
        let token = self.next_token;
        let kind = match &self.state.reply_target {
            Some(id) => SubmissionKind::Reply {
                message_id: id.clone(),
            },
            None => SubmissionKind::Message,
        };
        self.in_flight = Some(InFlight {
            token,
            draft_text: self.state.draft_text.clone(),
            reply_target: self.state.reply_target.clone(),
        });
        self.state.phase = ComposerPhase::Sending;
        Ok(Submission {
            token,
            kind,
            text,
            sender: self.state.effective_sender(),
        })
    }

    /// Applies a submission result. Returns false for results that no longer match
    /// the in-flight submission.
    ///
    /// A failed submission whose draft was cleared mid-flight (by retargeting)
    /// gets its text and target back so it can be retried.
    pub fn finish_submit(&mut self, token: u64, ok: bool) -> bool {
        if self.in_flight.as_ref().map(|f| f.token) != Some(token) {
            return false;
        }
        let Some(flight) = self.in_flight.take() else {
            return false;
        };
        if ok {
            self.state.draft_text.clear();
            self.state.reply_target = None;
        } else if self.state.draft_text.is_empty() {
            self.state.draft_text = flight.draft_text;
            self.state.reply_target = flight.reply_target;
        }
        self.settle_phase();
        true
    }

    fn settle_phase(&mut self) {
        if self.in_flight.is_some() {
            self.state.phase = ComposerPhase::Sending;
            return;
        }
        self.state.phase = if self.state.reply_target.is_some() {
            ComposerPhase::Replying
        } else if !self.state.draft_text.is_empty() {
            ComposerPhase::Composing
        } else {
            ComposerPhase::Idle
        };
    }
}
