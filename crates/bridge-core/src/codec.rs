//! Encoding and decoding of relay-network events to/from swarm objects
//! (component design §4.1).

use crate::canonical::{compute_event_id, event_sign_bytes};
use crate::crypto::schnorr_verify;
use crate::error::{Error, Result};
use crate::types::Event;

/// Encodes/decodes events for storage in the swarm, with optional
/// signature verification on decode.
pub struct EventCodec;

impl EventCodec {
    /// Check the structural invariants the data model requires of a
    /// (possibly unsigned) event: `id`, when present, must be 64 lowercase
    /// hex chars; `sig`, when present, must be 128 lowercase hex chars; `id`
    /// and `sig` must either both be empty (unsigned draft) or both be set;
    /// every tag must be a non-empty sequence of strings.
    fn validate(event: &Event) -> Result<()> {
        let hex_of_len = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit());

        if event.id.is_empty() != event.sig.is_empty() {
            return Err(Error::InvalidEvent(
                "id and sig must either both be set or both be empty".to_string(),
            ));
        }
        if !event.id.is_empty() && !hex_of_len(&event.id, 64) {
            return Err(Error::InvalidEvent("id must be 64 hex chars".to_string()));
        }
        if !event.sig.is_empty() && !hex_of_len(&event.sig, 128) {
            return Err(Error::InvalidEvent("sig must be 128 hex chars".to_string()));
        }
        for tag in &event.tags {
            if tag.is_empty() {
                return Err(Error::InvalidEvent("tags must be non-empty".to_string()));
            }
        }
        Ok(())
    }

    /// Validate, then JSON-serialize an event exactly as received; no
    /// re-signing, no field reordering beyond what `Event`'s declared field
    /// order gives.
    pub fn encode(event: &Event) -> Result<Vec<u8>> {
        Self::validate(event)?;
        Ok(serde_json::to_vec(event)?)
    }

    /// Parse an event, validate its structure, and, if `verify_sig` is set,
    /// check its Schnorr signature. A signature mismatch is logged by the
    /// caller and does not fail decoding by itself — callers decide whether
    /// to discard the event. Structural invalidity does fail decoding.
    pub fn decode(bytes: &[u8], verify_sig: bool) -> Result<(Event, bool)> {
        let event: Event = serde_json::from_slice(bytes)?;
        Self::validate(&event)?;
        if !verify_sig {
            return Ok((event, true));
        }
        let valid = Self::verify(&event).unwrap_or(false);
        Ok((event, valid))
    }

    /// Check an event's Schnorr signature over its canonical sign-bytes.
    pub fn verify(event: &Event) -> Result<bool> {
        let sign_bytes = event_sign_bytes(
            &event.pubkey,
            event.created_at,
            event.kind,
            &event.tags,
            &event.content,
        )?;
        let pubkey_bytes = hex::decode(&event.pubkey)?;
        let pubkey: [u8; 32] = match pubkey_bytes.try_into() {
            Ok(p) => p,
            Err(_) => return Ok(false),
        };
        let sig_bytes = hex::decode(&event.sig)?;
        let sig: [u8; 64] = match sig_bytes.try_into() {
            Ok(s) => s,
            Err(_) => return Ok(false),
        };
        Ok(schnorr_verify(&pubkey, &sign_bytes, &sig).is_ok())
    }

    /// Recompute an event's id from its signable fields.
    pub fn compute_id(event: &Event) -> Result<String> {
        compute_event_id(
            &event.pubkey,
            event.created_at,
            event.kind,
            &event.tags,
            &event.content,
        )
    }

    /// The swarm object filename an event is seeded under.
    pub fn filename(event: &Event) -> String {
        format!("{}.json", event.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{schnorr_public_key_hex, schnorr_sign};

    fn signed_event(seed: [u8; 32], content: &str) -> Event {
        let pubkey = schnorr_public_key_hex(&seed).unwrap();
        let created_at = 1_700_000_000;
        let kind = 1;
        let tags = vec![];
        let sign_bytes = event_sign_bytes(&pubkey, created_at, kind, &tags, content).unwrap();
        let sig = schnorr_sign(&seed, &sign_bytes).unwrap();
        let id = compute_event_id(&pubkey, created_at, kind, &tags, content).unwrap();
        Event {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content: content.to_string(),
            sig: hex::encode(sig),
        }
    }

    #[test]
    fn encode_decode_round_trips() {
        let event = signed_event([1u8; 32], "hello");
        let bytes = EventCodec::encode(&event).unwrap();
        let (decoded, _) = EventCodec::decode(&bytes, false).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_with_verification_accepts_valid_signature() {
        let event = signed_event([2u8; 32], "world");
        let bytes = EventCodec::encode(&event).unwrap();
        let (_, valid) = EventCodec::decode(&bytes, true).unwrap();
        assert!(valid);
    }

    #[test]
    fn decode_with_verification_rejects_tampered_content() {
        let mut event = signed_event([3u8; 32], "original");
        event.content = "tampered".to_string();
        let bytes = EventCodec::encode(&event).unwrap();
        let (_, valid) = EventCodec::decode(&bytes, true).unwrap();
        assert!(!valid);
    }

    #[test]
    fn compute_id_matches_stored_id() {
        let event = signed_event([4u8; 32], "x");
        assert_eq!(EventCodec::compute_id(&event).unwrap(), event.id);
    }

    #[test]
    fn filename_is_id_dot_json() {
        let event = signed_event([5u8; 32], "y");
        assert_eq!(EventCodec::filename(&event), format!("{}.json", event.id));
    }

    #[test]
    fn encode_rejects_id_without_sig() {
        let mut event = signed_event([6u8; 32], "z");
        event.sig = String::new();
        assert!(matches!(EventCodec::encode(&event), Err(crate::error::Error::InvalidEvent(_))));
    }

    #[test]
    fn encode_rejects_malformed_tag() {
        let mut event = signed_event([7u8; 32], "z");
        event.tags = vec![vec![]];
        assert!(matches!(EventCodec::encode(&event), Err(crate::error::Error::InvalidEvent(_))));
    }

    #[test]
    fn decode_rejects_non_hex_id() {
        let mut event = signed_event([8u8; 32], "z");
        event.id = "not-hex".repeat(9);
        let bytes = serde_json::to_vec(&event).unwrap();
        assert!(matches!(EventCodec::decode(&bytes, false), Err(crate::error::Error::InvalidEvent(_))));
    }

    #[test]
    fn unsigned_draft_with_empty_id_and_sig_is_valid() {
        let event = Event {
            kind: 1,
            content: "draft".to_string(),
            created_at: 1_700_000_000,
            ..Default::default()
        };
        assert!(EventCodec::encode(&event).is_ok());
    }
}
