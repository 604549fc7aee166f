//! Core protocol types for the nostr-over-bt bridge.
//!
//! [`Event`] mirrors the relay network's wire JSON exactly (field names and
//! types matter for interop); the rest are bridge-internal artifacts.

use serde::{Deserialize, Serialize};

/// A single tag: an ordered, non-empty sequence of strings. The first
/// element is conventionally the tag name (`"e"`, `"p"`, `"d"`, `"bt"`, ...).
pub type Tag = Vec<String>;

/// Relay-network event. Deliberately permissive (`id`/`sig` may be empty in
/// an unsigned draft) — [`crate::codec::EventCodec`] is what enforces the
/// stricter invariants described in the data model.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// 32-byte hex content hash (64 hex chars)
    pub id: String,
    /// 32-byte hex Schnorr public key
    pub pubkey: String,
    /// Unix seconds
    pub created_at: u64,
    /// Event kind (see the kind table in the data model)
    pub kind: u32,
    /// Ordered tag list
    pub tags: Vec<Tag>,
    pub content: String,
    /// Hex signature, empty on unsigned drafts
    pub sig: String,
}

impl Event {
    /// First value of the first tag named `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name) && t.len() >= 2)
            .map(|t| t[1].as_str())
    }

    /// All values (second element) of tags named `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name) && t.len() >= 2)
            .map(|t| t[1].as_str())
    }

    /// The `d` tag value, used to scope parameterized-replaceable events.
    pub fn d_tag(&self) -> Option<&str> {
        self.tag_value("d")
    }

    pub fn is_replaceable(&self) -> bool {
        matches!(self.kind, 0 | 3) || (10000..20000).contains(&self.kind)
    }

    pub fn is_parameterized_replaceable(&self) -> bool {
        (30000..40000).contains(&self.kind)
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == 5
    }
}

/// d-tag value marking a kind-30078 attestation binding relay pubkey to
/// swarm pubkey.
pub const D_TAG_IDENTITY: &str = "nostr-over-bt-identity";
/// d-tag value marking a kind-30078 bridge-discovery event carrying the
/// current feed-index magnet.
pub const D_TAG_FEED: &str = "nostr-over-bt-feed";
/// Kind used for both attestation and bridge-discovery application records.
pub const KIND_BRIDGE: u32 = 30078;

/// One entry in a [`crate::feed_index::FeedIndex`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub magnet: String,
    pub ts: u64,
    pub kind: u32,
}

/// The feed index object, serialized as `index.json` and seeded into the
/// swarm.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedIndexData {
    pub updated_at: u64,
    pub items: Vec<IndexEntry>,
}

/// Value payload of a DHT pointer record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointerValue {
    /// 20-byte BitTorrent infohash
    pub ih: [u8; 20],
    pub ts: u64,
    /// Relay pubkey bound to this pointer, if known
    pub npk: Option<[u8; 32]>,
}

/// A signed, monotonically-versioned BEP-44-style mutable record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointerRecord {
    /// 32-byte public key identifying this mutable slot
    pub k: [u8; 32],
    pub seq: u64,
    pub v: PointerValue,
    /// 64-byte Ed25519 signature over the bencoded `(seq, v)` pair
    #[serde(with = "serde_bytes")]
    pub sig: [u8; 64],
}

/// Resolved view of a pointer record, as returned by a DHT GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPointer {
    pub infohash: [u8; 20],
    pub ts: u64,
    pub seq: u64,
    pub npk: Option<[u8; 32]>,
}
