//! Web-of-trust graph: shortest-path-merge follow set built by walking
//! contact lists (component design §4.9).

use bridge_core::types::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WoTNode {
    pub degree: u8,
    pub last_synced: u64,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Pubkey → `{degree, last_synced}`, internally synchronized so
/// `TransportCoordinator`'s recursive sync can hold a shared reference
/// across concurrent degree-expansion tasks.
pub struct WoTGraph {
    max_degree: u8,
    nodes: Arc<RwLock<HashMap<String, WoTNode>>>,
}

impl WoTGraph {
    pub fn new(max_degree: u8) -> Self {
        Self {
            max_degree,
            nodes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn max_degree(&self) -> u8 {
        self.max_degree
    }

    /// Walk a kind-3 contact list event's `p` tags, adding each followed
    /// pubkey at `degree`. No-op if `degree` exceeds `max_degree`.
    pub fn parse_contact_list(&self, event: &Event, degree: u8) {
        if degree > self.max_degree {
            return;
        }
        for pubkey in event.tag_values("p") {
            self.add(pubkey, degree);
        }
    }

    /// Insert `pubkey` at `degree`, or overwrite if `degree` is a strictly
    /// shorter path than what's already recorded.
    pub fn add(&self, pubkey: &str, degree: u8) {
        let mut nodes = self.nodes.write();
        let entry = nodes.get(pubkey).copied();
        match entry {
            Some(existing) if existing.degree <= degree => {}
            _ => {
                nodes.insert(
                    pubkey.to_string(),
                    WoTNode {
                        degree,
                        last_synced: now_unix(),
                    },
                );
            }
        }
    }

    pub fn pubkeys_at(&self, degree: u8) -> Vec<String> {
        self.nodes
            .read()
            .iter()
            .filter(|(_, node)| node.degree == degree)
            .map(|(pubkey, _)| pubkey.clone())
            .collect()
    }

    /// Every tracked pubkey, regardless of degree.
    pub fn all_pubkeys(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    pub fn is_following(&self, pubkey: &str) -> bool {
        self.nodes.read().contains_key(pubkey)
    }

    pub fn contains(&self, pubkey: &str) -> bool {
        self.is_following(pubkey)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact_list(pubkeys: &[&str]) -> Event {
        Event {
            kind: 3,
            tags: pubkeys
                .iter()
                .map(|pk| vec!["p".to_string(), pk.to_string()])
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn parse_contact_list_adds_every_p_tag_at_given_degree() {
        let graph = WoTGraph::new(2);
        graph.parse_contact_list(&contact_list(&["alice", "bob"]), 1);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.pubkeys_at(1).len(), 2);
    }

    #[test]
    fn parse_contact_list_skips_beyond_max_degree() {
        let graph = WoTGraph::new(1);
        graph.parse_contact_list(&contact_list(&["alice"]), 2);
        assert!(graph.is_empty());
    }

    #[test]
    fn add_keeps_shortest_path() {
        let graph = WoTGraph::new(3);
        graph.add("alice", 2);
        graph.add("alice", 1);
        assert_eq!(graph.pubkeys_at(1), vec!["alice".to_string()]);
        graph.add("alice", 3);
        assert_eq!(graph.pubkeys_at(1), vec!["alice".to_string()]);
    }

    #[test]
    fn contains_and_is_following_agree() {
        let graph = WoTGraph::new(2);
        graph.add("carol", 1);
        assert!(graph.contains("carol"));
        assert!(graph.is_following("carol"));
        assert!(!graph.contains("dave"));
    }
}
