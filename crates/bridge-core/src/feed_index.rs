//! FeedIndex: an append-bounded, time-ordered set of event descriptors
//! (data model §3, component design §4.3).

use crate::types::{Event, FeedIndexData, IndexEntry};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default maximum number of items retained in a feed index.
pub const DEFAULT_LIMIT: usize = 100;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Bounded, time-descending, id-unique set of index entries.
#[derive(Clone, Debug)]
pub struct FeedIndex {
    updated_at: u64,
    items: Vec<IndexEntry>,
    limit: usize,
}

impl FeedIndex {
    pub fn new(limit: usize) -> Self {
        Self {
            updated_at: 0,
            items: Vec::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[IndexEntry] {
        &self.items
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Add an event descriptor. No-op if `event.id` is already present.
    /// Re-sorts by `ts` descending and truncates to `limit`.
    pub fn add(&mut self, event: &Event, magnet: impl Into<String>) {
        if self.items.iter().any(|i| i.id == event.id) {
            return;
        }
        self.items.push(IndexEntry {
            id: event.id.clone(),
            magnet: magnet.into(),
            ts: event.created_at,
            kind: event.kind,
        });
        self.items.sort_by(|a, b| b.ts.cmp(&a.ts));
        self.items.truncate(self.limit);
        self.updated_at = now_unix();
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let data = FeedIndexData {
            updated_at: self.updated_at,
            items: self.items.clone(),
        };
        // Field order is fixed by struct declaration order; infallible for
        // these plain types.
        serde_json::to_vec(&data).expect("FeedIndexData always serializes")
    }

    /// Parse a feed index object. Malformed input yields an empty index
    /// rather than an error — callers treat this as "nothing known yet"
    /// and log a warning themselves.
    pub fn from_bytes(bytes: &[u8], limit: usize) -> Self {
        match serde_json::from_slice::<FeedIndexData>(bytes) {
            Ok(data) => {
                let mut items = data.items;
                items.sort_by(|a, b| b.ts.cmp(&a.ts));
                items.truncate(limit);
                Self {
                    updated_at: data.updated_at,
                    items,
                    limit,
                }
            }
            Err(_) => Self::new(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, ts: u64) -> Event {
        Event {
            id: id.to_string(),
            pubkey: "a".repeat(64),
            created_at: ts,
            kind: 1,
            tags: vec![],
            content: String::new(),
            sig: "b".repeat(128),
        }
    }

    #[test]
    fn adding_duplicate_is_noop() {
        let mut idx = FeedIndex::new(DEFAULT_LIMIT);
        idx.add(&event("e1", 100), "magnet:?xt=urn:btih:1");
        idx.add(&event("e1", 100), "magnet:?xt=urn:btih:1");
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn sorted_descending_by_timestamp() {
        let mut idx = FeedIndex::new(DEFAULT_LIMIT);
        idx.add(&event("e1", 100), "m1");
        idx.add(&event("e2", 300), "m2");
        idx.add(&event("e3", 200), "m3");
        let ts: Vec<u64> = idx.items().iter().map(|i| i.ts).collect();
        assert_eq!(ts, vec![300, 200, 100]);
    }

    #[test]
    fn truncates_to_limit_keeping_newest() {
        let mut idx = FeedIndex::new(2);
        idx.add(&event("e1", 100), "m1");
        idx.add(&event("e2", 300), "m2");
        idx.add(&event("e3", 200), "m3");
        assert_eq!(idx.len(), 2);
        let ts: Vec<u64> = idx.items().iter().map(|i| i.ts).collect();
        assert_eq!(ts, vec![300, 200]);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut idx = FeedIndex::new(DEFAULT_LIMIT);
        idx.add(&event("e1", 100), "m1");
        let bytes = idx.to_bytes();
        let restored = FeedIndex::from_bytes(&bytes, DEFAULT_LIMIT);
        assert_eq!(restored.items(), idx.items());
    }

    #[test]
    fn malformed_bytes_yield_empty_index() {
        let idx = FeedIndex::from_bytes(b"not json", DEFAULT_LIMIT);
        assert!(idx.is_empty());
    }
}
