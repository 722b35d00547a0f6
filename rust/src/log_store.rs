// Ordered, id-deduplicated message log. `ingest` is the only way in.

use std::collections::HashSet;

use crate::state::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    /// Known id; the incoming copy carried more replies and they were appended.
    RepliesExtended,
    Duplicate,
}

impl IngestOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, IngestOutcome::Duplicate)
    }
}

/// Messages ascending by `created_at`; equal timestamps keep arrival order.
#[derive(Debug, Clone, Default)]
pub struct LogStore {
    entries: Vec<ChatMessage>,
    ids: HashSet<String>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, message: ChatMessage) -> IngestOutcome {
        if self.ids.contains(&message.id) {
            return self.extend_replies(message);
        }
        // Insert after every entry with an equal timestamp so ties keep arrival order.
        let pos = self
            .entries
            .partition_point(|m| m.created_at <= message.created_at);
        self.ids.insert(message.id.clone());
        self.entries.insert(pos, message);
        IngestOutcome::Inserted
    }

    /// Snapshot path. Returns how many ingests changed the log.
    pub fn ingest_all(&mut self, messages: impl IntoIterator<Item = ChatMessage>) -> usize {
        messages
            .into_iter()
            .map(|m| self.ingest(m))
            .filter(|o| o.changed())
            .count()
    }

    fn extend_replies(&mut self, incoming: ChatMessage) -> IngestOutcome {
        let Some(existing) = self.entries.iter_mut().find(|m| m.id == incoming.id) else {
            return IngestOutcome::Duplicate;
        };
        if incoming.replies.len() <= existing.replies.len() {
            return IngestOutcome::Duplicate;
        }
        // Replies are append-only: keep what we have, take only the tail.
        let known = existing.replies.len();
        existing
            .replies
            .extend(incoming.replies.into_iter().skip(known));
        IngestOutcome::RepliesExtended
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
