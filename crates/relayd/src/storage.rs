//! RelayStore: a sled-backed embedded store with hand-maintained secondary
//! indices emulating replaceable-kind deletion rules and a substring
//! full-text search (component design §4.11).

use bridge_core::types::Event;
use std::collections::HashSet;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage backend error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A query over stored events. Absent fields match anything.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct EventFilter {
    pub ids: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
    pub kinds: Option<Vec<u32>>,
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub tags: Vec<(char, Vec<String>)>,
}

#[derive(Debug, Clone, Default)]
pub struct SaveOutcome {
    pub inserted: bool,
    pub replaced: usize,
}

fn time_key(created_at: u64, id: &str) -> Vec<u8> {
    let inv = u64::MAX - created_at;
    let mut key = inv.to_be_bytes().to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

fn author_kind_prefix(pubkey: &str, kind: u32) -> Vec<u8> {
    format!("{pubkey}\0{kind:010}\0").into_bytes()
}

fn author_kind_key(pubkey: &str, kind: u32, created_at: u64, id: &str) -> Vec<u8> {
    let mut key = author_kind_prefix(pubkey, kind);
    key.extend_from_slice(format!("{created_at:020}\0{id}").as_bytes());
    key
}

fn tag_prefix(name: char, value: &str) -> Vec<u8> {
    format!("{name}\0{value}\0").into_bytes()
}

fn tag_key(name: char, value: &str, id: &str) -> Vec<u8> {
    let mut key = tag_prefix(name, value);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Embedded key-value store (`sled`) with secondary indices for replaceable
/// deletion rules, tag filters, and a lowercase-content shadow index used
/// for substring "full text search".
pub struct RelayStore {
    events: sled::Tree,
    by_time: sled::Tree,
    by_author_kind: sled::Tree,
    by_tag: sled::Tree,
    content_idx: sled::Tree,
}

impl RelayStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            events: db.open_tree("events")?,
            by_time: db.open_tree("by_time")?,
            by_author_kind: db.open_tree("by_author_kind")?,
            by_tag: db.open_tree("by_tag")?,
            content_idx: db.open_tree("content_idx")?,
        })
    }

    fn index_event(&self, event: &Event) -> Result<()> {
        self.by_time.insert(time_key(event.created_at, &event.id), event.id.as_bytes())?;
        self.by_author_kind.insert(
            author_kind_key(&event.pubkey, event.kind, event.created_at, &event.id),
            event.id.as_bytes(),
        )?;
        for tag in &event.tags {
            if let Some(first) = tag.first() {
                if (first.len() == 1 || first == "d") && tag.len() >= 2 {
                    let name = first.chars().next().unwrap();
                    self.by_tag
                        .insert(tag_key(name, &tag[1], &event.id), event.id.as_bytes())?;
                }
            }
        }
        self.content_idx
            .insert(event.id.as_bytes(), event.content.to_lowercase().as_bytes())?;
        Ok(())
    }

    fn deindex_event(&self, event: &Event) -> Result<()> {
        self.by_time.remove(time_key(event.created_at, &event.id))?;
        self.by_author_kind.remove(author_kind_key(
            &event.pubkey,
            event.kind,
            event.created_at,
            &event.id,
        ))?;
        for tag in &event.tags {
            if let Some(first) = tag.first() {
                if (first.len() == 1 || first == "d") && tag.len() >= 2 {
                    let name = first.chars().next().unwrap();
                    self.by_tag.remove(tag_key(name, &tag[1], &event.id))?;
                }
            }
        }
        self.content_idx.remove(event.id.as_bytes())?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Event>> {
        match self.events.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn delete_by_id(&self, id: &str) -> Result<()> {
        if let Some(event) = self.get_by_id(id)? {
            self.deindex_event(&event)?;
            self.events.remove(id.as_bytes())?;
        }
        Ok(())
    }

    /// Events by the same author+kind, ordered by ascending `created_at`.
    fn same_author_kind(&self, pubkey: &str, kind: u32) -> Result<Vec<Event>> {
        let prefix = author_kind_prefix(pubkey, kind);
        let mut events = Vec::new();
        for item in self.by_author_kind.scan_prefix(&prefix) {
            let (_, id_bytes) = item?;
            let id = String::from_utf8_lossy(&id_bytes).to_string();
            if let Some(event) = self.get_by_id(&id)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Apply an event's replaceable/parameterized-replaceable/deletion
    /// semantics, then insert-or-ignore the event itself.
    pub fn save_event(&self, event: &Event) -> Result<SaveOutcome> {
        let mut replaced = 0;

        if event.is_replaceable() {
            for existing in self.same_author_kind(&event.pubkey, event.kind)? {
                if existing.created_at < event.created_at {
                    self.delete_by_id(&existing.id)?;
                    replaced += 1;
                }
            }
        } else if event.is_parameterized_replaceable() {
            let d_tag = event.d_tag();
            for existing in self.same_author_kind(&event.pubkey, event.kind)? {
                if existing.created_at < event.created_at && existing.d_tag() == d_tag {
                    self.delete_by_id(&existing.id)?;
                    replaced += 1;
                }
            }
        } else if event.is_deletion() {
            let targets: HashSet<&str> = event.tag_values("e").collect();
            for target_id in targets {
                if let Some(target) = self.get_by_id(target_id)? {
                    if target.pubkey == event.pubkey {
                        self.delete_by_id(target_id)?;
                        replaced += 1;
                    }
                }
            }
        }

        if self.events.contains_key(event.id.as_bytes())? {
            return Ok(SaveOutcome { inserted: false, replaced });
        }

        let bytes = serde_json::to_vec(event)?;
        self.events.insert(event.id.as_bytes(), bytes)?;
        self.index_event(event)?;
        Ok(SaveOutcome { inserted: true, replaced })
    }

    /// Query stored events, newest-first, honoring every constraint set on
    /// `filter`.
    pub fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let candidate_ids: Option<Vec<String>> = if let Some((name, values)) = filter.tags.first()
        {
            let mut ids = HashSet::new();
            for value in values {
                for item in self.by_tag.scan_prefix(tag_prefix(*name, value)) {
                    let (_, id_bytes) = item?;
                    ids.insert(String::from_utf8_lossy(&id_bytes).to_string());
                }
            }
            Some(ids.into_iter().collect())
        } else {
            None
        };

        let mut results = Vec::new();
        match candidate_ids {
            Some(ids) => {
                let mut events: Vec<Event> = ids
                    .iter()
                    .filter_map(|id| self.get_by_id(id).ok().flatten())
                    .filter(|event| self.matches(event, filter))
                    .collect();
                events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                results = events;
            }
            None => {
                for item in self.by_time.iter() {
                    let (_, id_bytes) = item?;
                    let id = String::from_utf8_lossy(&id_bytes).to_string();
                    if let Some(event) = self.get_by_id(&id)? {
                        if self.matches(&event, filter) {
                            results.push(event);
                        }
                    }
                    if let Some(limit) = filter.limit {
                        if results.len() >= limit {
                            break;
                        }
                    }
                }
            }
        }

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    fn matches(&self, event: &Event, filter: &EventFilter) -> bool {
        if let Some(ids) = &filter.ids {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some(authors) = &filter.authors {
            if !authors.contains(&event.pubkey) {
                return false;
            }
        }
        if let Some(kinds) = &filter.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(since) = filter.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = filter.until {
            if event.created_at > until {
                return false;
            }
        }
        for (name, values) in &filter.tags {
            if !event
                .tag_values(&name.to_string())
                .any(|v| values.iter().any(|want| want == v))
            {
                return false;
            }
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            let haystack = self
                .content_idx
                .get(event.id.as_bytes())
                .ok()
                .flatten()
                .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
                .unwrap_or_default();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        true
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn flush(&self) -> Result<()> {
        self.events.flush()?;
        self.by_time.flush()?;
        self.by_author_kind.flush()?;
        self.by_tag.flush()?;
        self.content_idx.flush()?;
        Ok(())
    }
}
