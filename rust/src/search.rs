use crate::state::ChatMessage;

pub const SEARCH_HISTORY_LIMIT: usize = 5;

/// Case-insensitive substring match on message text. Senders and replies are not searched.
/// An empty query returns the log unchanged.
pub fn filter_messages(log: &[ChatMessage], query: &str) -> Vec<ChatMessage> {
    if query.is_empty() {
        return log.to_vec();
    }
    let needle = query.to_lowercase();
    log.iter()
        .filter(|m| m.text.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Bounded most-recently-used list of submitted queries, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHistory {
    entries: Vec<String>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, dropping blanks and duplicates.
    pub fn from_entries(entries: Vec<String>) -> Self {
        let mut history = Self::new();
        for entry in entries.into_iter().rev() {
            history.record(&entry);
        }
        history
    }

    /// Returns false when the query was blank or already the newest entry.
    pub fn record(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        if self
            .entries
            .first()
            .is_some_and(|e| e.eq_ignore_ascii_case(query))
        {
            return false;
        }
        self.entries.retain(|e| !e.eq_ignore_ascii_case(query));
        self.entries.insert(0, query.to_string());
        self.entries.truncate(SEARCH_HISTORY_LIMIT);
        true
    }

    pub fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        had_entries
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
