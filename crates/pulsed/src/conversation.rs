//! Per-session chat history.

use chrono::Utc;
use pulse_shared::rpc::HistoryEntry;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Sessions are created on first message and live until cleared.
pub struct ConversationStore {
    sessions: Mutex<HashMap<String, VecDeque<HistoryEntry>>>,
    limit: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ConversationStore {
    pub fn new(limit: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limit: limit.max(1),
        }
    }

    /// Append one exchange, dropping the oldest beyond the limit.
    pub fn record(&self, session: &str, query: &str, response: &str) {
        let Ok(mut sessions) = self.sessions.lock() else {
            return;
        };
        let history = sessions.entry(session.to_string()).or_default();
        history.push_back(HistoryEntry {
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        });
        while history.len() > self.limit {
            history.pop_front();
        }
    }

    /// Oldest first. Unknown sessions have an empty history.
    pub fn history(&self, session: &str) -> Vec<HistoryEntry> {
        self.sessions
            .lock()
            .ok()
            .and_then(|s| s.get(session).map(|h| h.iter().cloned().collect()))
            .unwrap_or_default()
    }

    /// True when the session existed.
    pub fn clear(&self, session: &str) -> bool {
        self.sessions
            .lock()
            .map(|mut s| s.remove(session).is_some())
            .unwrap_or(false)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_eleven_to_ten() {
        let store = ConversationStore::default();
        for i in 0..11 {
            store.record("s1", &format!("q{}", i), "a");
        }
        let history = store.history("s1");
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].query, "q1");
        assert_eq!(history[9].query, "q10");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = ConversationStore::new(3);
        store.record("a", "hello", "hi");
        store.record("b", "status", "ok");
        assert_eq!(store.history("a").len(), 1);
        assert_eq!(store.session_count(), 2);
        assert!(store.history("missing").is_empty());
    }

    #[test]
    fn test_clear() {
        let store = ConversationStore::default();
        store.record("a", "q", "r");
        assert!(store.clear("a"));
        assert!(!store.clear("a"));
        assert!(store.history("a").is_empty());
    }
}
