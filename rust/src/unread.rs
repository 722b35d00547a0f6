use std::collections::BTreeMap;

use crate::state::{UnreadSender, UnreadState};

#[derive(Debug, Clone)]
struct UnreadEntry {
    sender_name: String,
    count: u32,
}

/// Per-sender unseen direct-message counts. Only explicit mark-seen calls reset a count.
#[derive(Debug, Clone, Default)]
pub struct UnreadTracker {
    by_sender: BTreeMap<String, UnreadEntry>,
    total: u32,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_direct_message(&mut self, sender_id: &str, sender_name: &str) -> u32 {
        let entry = self
            .by_sender
            .entry(sender_id.to_string())
            .or_insert_with(|| UnreadEntry {
                sender_name: sender_name.to_string(),
                count: 0,
            });
        if !sender_name.is_empty() {
            entry.sender_name = sender_name.to_string();
        }
        entry.count = entry.count.saturating_add(1);
        self.total = self.total.saturating_add(1);
        entry.count
    }

    /// Returns false if the sender had nothing unread.
    pub fn mark_seen(&mut self, sender_id: &str) -> bool {
        self.by_sender.remove(sender_id).is_some()
    }

    pub fn mark_all_seen(&mut self) -> bool {
        let changed = !self.by_sender.is_empty() || self.total != 0;
        self.by_sender.clear();
        self.total = 0;
        changed
    }

    pub fn count(&self, sender_id: &str) -> u32 {
        self.by_sender.get(sender_id).map(|e| e.count).unwrap_or(0)
    }

    pub fn snapshot(&self) -> UnreadState {
        UnreadState {
            senders: self
                .by_sender
                .iter()
                .map(|(id, e)| UnreadSender {
                    sender_id: id.clone(),
                    sender_name: e.sender_name.clone(),
                    count: e.count,
                })
                .collect(),
            total: self.total,
        }
    }
}
