use super::AppCore;
use crate::search::SearchHistory;

const SEARCH_HISTORY_KEY: &str = "search_history";

impl AppCore {
    pub(super) fn load_search_history(&mut self) {
        let entries = match self.store.get(SEARCH_HISTORY_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<String>>(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(%e, "stored search history unreadable; ignoring");
                    return;
                }
            },
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(%e, "failed to load search history");
                return;
            }
        };
        self.search_history = SearchHistory::from_entries(entries);
        self.state.search.history = self.search_history.entries().to_vec();
    }

    pub(super) fn save_search_history(&self) {
        let json = match serde_json::to_string(self.search_history.entries()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(%e, "failed to encode search history");
                return;
            }
        };
        if let Err(e) = self.store.set(SEARCH_HISTORY_KEY, &json) {
            tracing::warn!(%e, "failed to persist search history");
        }
    }
}
