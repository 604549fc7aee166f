//! Canonical encodings used for hashing and signing.
//!
//! Two distinct normative encodings exist in this crate:
//! - the relay network's event-id encoding: a compact JSON array, hashed
//!   with SHA-256 (`event_sign_bytes` / `compute_event_id`);
//! - BEP-44's bencoded pointer value, signed with Ed25519
//!   (`pointer_value_bencode` / `pointer_sign_bytes`).

use crate::error::{Error, Result};
use crate::types::{PointerValue, Tag};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bytes that are hashed (SHA-256) to produce an event's `id`, and that are
/// signed (Schnorr) to produce its `sig`. Matches the relay network's own
/// `[0, pubkey, created_at, kind, tags, content]` id-computation rule.
pub fn event_sign_bytes(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<Vec<u8>> {
    let arr = (0u8, pubkey, created_at, kind, tags, content);
    serde_json::to_vec(&arr).map_err(Error::from)
}

/// Compute the lowercase-hex event id from its signable fields.
pub fn compute_event_id(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<String> {
    let bytes = event_sign_bytes(pubkey, created_at, kind, tags, content)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Wire shape of [`PointerValue`] for bencoding: byte strings are
/// represented as `ByteBuf` so bencode emits `ih`/`npk` as bencode byte
/// strings rather than integer lists.
#[derive(Serialize, Deserialize)]
struct PointerValueWire {
    ih: serde_bytes::ByteBuf,
    ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    npk: Option<serde_bytes::ByteBuf>,
}

/// Bencode a pointer's `v` dictionary.
pub fn pointer_value_bencode(v: &PointerValue) -> Result<Vec<u8>> {
    let wire = PointerValueWire {
        ih: serde_bytes::ByteBuf::from(v.ih.to_vec()),
        ts: v.ts,
        npk: v.npk.map(|n| serde_bytes::ByteBuf::from(n.to_vec())),
    };
    bt_bencode::to_vec(&wire).map_err(|e| Error::Bencode(e.to_string()))
}

/// Decode a bencoded `v` dictionary back into a [`PointerValue`].
pub fn pointer_value_from_bencode(bytes: &[u8]) -> Result<PointerValue> {
    let wire: PointerValueWire =
        bt_bencode::from_slice(bytes).map_err(|e| Error::Bencode(e.to_string()))?;
    let ih: [u8; 20] = wire
        .ih
        .as_ref()
        .try_into()
        .map_err(|_| Error::Bencode("infohash must be 20 bytes".into()))?;
    let npk = match wire.npk {
        Some(n) => Some(
            n.as_ref()
                .try_into()
                .map_err(|_| Error::Bencode("npk must be 32 bytes".into()))?,
        ),
        None => None,
    };
    Ok(PointerValue { ih, ts: wire.ts, npk })
}

/// Bytes signed for a pointer record: `3:seq i{seq}e 1:v {v_bencoded}`,
/// the bencoded concatenation BEP-44 mandates.
pub fn pointer_sign_bytes(seq: u64, v_bencoded: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32 + v_bencoded.len());
    bytes.extend_from_slice(b"3:seq");
    bytes.extend_from_slice(format!("i{seq}e").as_bytes());
    bytes.extend_from_slice(b"1:v");
    bytes.extend_from_slice(v_bencoded);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_is_deterministic() {
        let tags: Vec<Tag> = vec![];
        let id1 = compute_event_id("ab".repeat(32).as_str(), 1000, 1, &tags, "hi").unwrap();
        let id2 = compute_event_id("ab".repeat(32).as_str(), 1000, 1, &tags, "hi").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 64);
    }

    #[test]
    fn event_id_changes_with_content() {
        let tags: Vec<Tag> = vec![];
        let pk = "ab".repeat(32);
        let id1 = compute_event_id(&pk, 1000, 1, &tags, "hi").unwrap();
        let id2 = compute_event_id(&pk, 1000, 1, &tags, "bye").unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn pointer_value_bencode_round_trips() {
        let v = PointerValue {
            ih: [7u8; 20],
            ts: 1_700_000_000,
            npk: Some([9u8; 32]),
        };
        let bytes = pointer_value_bencode(&v).unwrap();
        let back = pointer_value_from_bencode(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn pointer_value_bencode_without_npk() {
        let v = PointerValue {
            ih: [1u8; 20],
            ts: 42,
            npk: None,
        };
        let bytes = pointer_value_bencode(&v).unwrap();
        let back = pointer_value_from_bencode(&bytes).unwrap();
        assert_eq!(v, back);
    }
}
