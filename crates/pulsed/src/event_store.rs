//! Bounded in-memory store of recent webhook events.

use pulse_shared::event::{Event, EventKind};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 100;

/// Ring buffer in insertion order. Once full, each insert evicts the
/// oldest-inserted event.
pub struct EventStore {
    events: Mutex<VecDeque<Event>>,
    capacity: usize,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Insert an event. An event reusing a stored id replaces the older one
    /// in its original slot, so eviction order follows first insertion.
    pub fn store(&self, event: Event) {
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        if let Some(slot) = events.iter_mut().find(|e| e.id == event.id) {
            *slot = event;
            return;
        }
        events.push_back(event);
        while events.len() > self.capacity {
            if let Some(evicted) = events.pop_front() {
                debug!("[HOOK] Evicted event {}", evicted.id);
            }
        }
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<Event> {
        self.select(|_| true, limit)
    }

    pub fn by_type(&self, kind: EventKind, limit: usize) -> Vec<Event> {
        self.select(|e| e.kind() == kind, limit)
    }

    pub fn get(&self, id: &str) -> Option<Event> {
        self.events
            .lock()
            .ok()?
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select<F>(&self, keep: F, limit: usize) -> Vec<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let mut selected: Vec<Event> = match self.events.lock() {
            Ok(events) => events.iter().filter(|e| keep(e)).cloned().collect(),
            Err(_) => return Vec::new(),
        };
        // Stable sort keeps later insertions first among equal timestamps
        selected.reverse();
        selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        selected.truncate(limit);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pulse_shared::event::{EventDetail, Severity};
    use serde_json::Value;

    fn event(id: &str, minutes_ago: i64, detail: EventDetail) -> Event {
        Event {
            id: id.to_string(),
            title: id.to_string(),
            severity: Severity::Info,
            status: "RECEIVED".to_string(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            affected_entities: None,
            source: "test".to_string(),
            detail,
        }
    }

    fn generic(id: &str, minutes_ago: i64) -> Event {
        event(id, minutes_ago, EventDetail::Generic { data: Value::Null })
    }

    #[test]
    fn test_evicts_oldest_at_capacity_plus_one() {
        let store = EventStore::new(3);
        for i in 0..4 {
            store.store(generic(&format!("e{}", i), 0));
        }
        assert_eq!(store.len(), 3);
        assert!(store.get("e0").is_none());
        assert!(store.get("e3").is_some());
    }

    #[test]
    fn test_default_capacity() {
        let store = EventStore::default();
        for i in 0..=DEFAULT_CAPACITY {
            store.store(generic(&format!("e{}", i), 0));
        }
        assert_eq!(store.len(), DEFAULT_CAPACITY);
        assert!(store.get("e0").is_none());
        assert!(store.get("e1").is_some());
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let store = EventStore::new(10);
        store.store(generic("old", 30));
        store.store(generic("new", 1));
        store.store(generic("mid", 10));
        let ids: Vec<String> = store.recent(2).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new".to_string(), "mid".to_string()]);
    }

    #[test]
    fn test_by_type_and_duplicate_ids() {
        let store = EventStore::new(10);
        store.store(generic("g1", 5));
        store.store(event(
            "P1",
            3,
            EventDetail::Deployment {
                name: None,
                version: None,
                entity: None,
            },
        ));
        store.store(generic("g1", 0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.by_type(EventKind::Generic, 10).len(), 1);
        assert_eq!(store.by_type(EventKind::Deployment, 10)[0].id, "P1");
        assert!(store.by_type(EventKind::Metric, 10).is_empty());
    }

    #[test]
    fn test_restored_id_keeps_its_eviction_slot() {
        let store = EventStore::new(3);
        for i in 0..3 {
            store.store(generic(&format!("e{}", i), 0));
        }
        let mut updated = generic("e0", 0);
        updated.status = "UPDATED".to_string();
        store.store(updated);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("e0").unwrap().status, "UPDATED");

        // e0 is still the oldest insertion, so it goes first
        store.store(generic("e3", 0));
        assert!(store.get("e0").is_none());
        assert!(store.get("e1").is_some());
        assert!(store.get("e3").is_some());
    }
}
