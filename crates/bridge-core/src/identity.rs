//! Bridge node identity: paired relay (Schnorr) and swarm (Ed25519) keys,
//! and the attestation event binding them together (component design §4.2).

use crate::canonical::{compute_event_id, event_sign_bytes};
use crate::crypto::{
    ed25519_public_key, ed25519_sign, schnorr_public_key_hex, schnorr_sign,
};
use crate::error::Result;
use crate::types::{Event, D_TAG_IDENTITY, KIND_BRIDGE};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Holds both halves of a node's keying material: the relay-network
/// Schnorr keypair used to sign events, and the swarm-network Ed25519
/// keypair used to sign DHT pointer records.
pub struct IdentityStore {
    schnorr_seckey: [u8; 32],
    ed25519_seed: [u8; 32],
}

impl IdentityStore {
    /// Derive a node identity from a single relay secret key, reusing it as
    /// the Ed25519 seed.
    ///
    /// This reuses one 32-byte secret across two distinct signature schemes.
    /// It is intentional (operators are expected to run one key per node,
    /// not two) and not believed to be a practical cross-algorithm weakness
    /// for secp256k1 Schnorr vs. Ed25519, but it has not been formally
    /// analyzed; callers who want key separation should use [`Self::generate`]
    /// and manage the two secrets independently.
    pub fn from_relay_secret(schnorr_seckey: [u8; 32]) -> Self {
        Self {
            schnorr_seckey,
            ed25519_seed: schnorr_seckey,
        }
    }

    /// Generate a fresh identity with independently-random keys for each
    /// scheme.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut schnorr_seckey = [0u8; 32];
        let mut ed25519_seed = [0u8; 32];
        rng.fill_bytes(&mut schnorr_seckey);
        rng.fill_bytes(&mut ed25519_seed);
        Self {
            schnorr_seckey,
            ed25519_seed,
        }
    }

    pub fn public_key_hex(&self) -> Result<String> {
        schnorr_public_key_hex(&self.schnorr_seckey)
    }

    pub fn swarm_public_key(&self) -> [u8; 32] {
        ed25519_public_key(&self.ed25519_seed)
    }

    pub fn swarm_public_key_hex(&self) -> String {
        hex::encode(self.swarm_public_key())
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.schnorr_seckey)
    }

    /// Sign arbitrary bytes with the Ed25519 key, for DHT pointer records.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        ed25519_sign(&self.ed25519_seed, message)
    }

    /// Sign a relay-network event draft, filling in `id`, `pubkey`, and
    /// `sig`.
    pub fn sign_event(&self, mut event: Event) -> Result<Event> {
        event.pubkey = self.public_key_hex()?;
        let sign_bytes = event_sign_bytes(
            &event.pubkey,
            event.created_at,
            event.kind,
            &event.tags,
            &event.content,
        )?;
        event.id = compute_event_id(
            &event.pubkey,
            event.created_at,
            event.kind,
            &event.tags,
            &event.content,
        )?;
        let sig = schnorr_sign(&self.schnorr_seckey, &sign_bytes)?;
        event.sig = hex::encode(sig);
        Ok(event)
    }

    /// Build an unsigned kind-30078 attestation event binding this node's
    /// relay pubkey to its swarm pubkey, under the `nostr-over-bt-identity`
    /// d-tag. Callers sign it with [`Self::sign_event`].
    pub fn attestation(&self, relay_pubkey_hex: &str) -> Event {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Event {
            id: String::new(),
            pubkey: String::new(),
            created_at,
            kind: KIND_BRIDGE,
            tags: vec![
                vec!["d".to_string(), D_TAG_IDENTITY.to_string()],
                vec!["swarm_pubkey".to_string(), self.swarm_public_key_hex()],
            ],
            content: format!(
                "{{\"relay_pubkey\":\"{relay_pubkey_hex}\",\"swarm_pubkey\":\"{}\"}}",
                self.swarm_public_key_hex()
            ),
            sig: String::new(),
        }
    }
}

/// Derive a deterministic 32-byte seed from arbitrary passphrase-like input,
/// for test/dev setups that don't have real key material on hand.
pub fn seed_from_passphrase(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_event_populates_id_pubkey_sig() {
        let identity = IdentityStore::from_relay_secret(seed_from_passphrase("alice"));
        let draft = Event {
            kind: 1,
            content: "hello".to_string(),
            created_at: 1_700_000_000,
            ..Default::default()
        };
        let signed = identity.sign_event(draft).unwrap();
        assert!(!signed.id.is_empty());
        assert_eq!(signed.pubkey, identity.public_key_hex().unwrap());
        assert!(!signed.sig.is_empty());
    }

    #[test]
    fn attestation_carries_identity_d_tag_and_both_pubkeys() {
        let identity = IdentityStore::from_relay_secret(seed_from_passphrase("bob"));
        let relay_pk = identity.public_key_hex().unwrap();
        let attestation = identity.attestation(&relay_pk);
        assert_eq!(attestation.kind, KIND_BRIDGE);
        assert_eq!(attestation.d_tag(), Some(D_TAG_IDENTITY));
        assert!(attestation.content.contains(&relay_pk));
        assert!(attestation.content.contains(&identity.swarm_public_key_hex()));
    }

    #[test]
    fn generate_produces_independent_keys() {
        let identity = IdentityStore::generate();
        assert_ne!(identity.schnorr_seckey, identity.ed25519_seed);
    }

    #[test]
    fn from_relay_secret_reuses_the_same_bytes() {
        let seed = seed_from_passphrase("carol");
        let identity = IdentityStore::from_relay_secret(seed);
        assert_eq!(identity.schnorr_seckey, seed);
        assert_eq!(identity.ed25519_seed, seed);
    }
}
