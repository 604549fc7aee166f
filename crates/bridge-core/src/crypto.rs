//! Cryptographic primitives for the bridge (RFC §4.1, §4.2, §6).
//!
//! Two signature schemes are in play, matching the two networks this crate
//! bridges: BIP-340 Schnorr over secp256k1 for relay-network events, and
//! Ed25519 for BEP-44 DHT pointer records.

use crate::error::{Error, Result};
use secp256k1::schnorr;
use secp256k1::{Keypair as SchnorrKeypair, Secp256k1, SecretKey, XOnlyPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Sign `message` (the canonical event bytes) with a secp256k1 Schnorr key.
pub fn schnorr_sign(seckey: &[u8; 32], message: &[u8]) -> Result<[u8; 64]> {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(seckey).map_err(|e| Error::InvalidKey(e.to_string()))?;
    let keypair = SchnorrKeypair::from_secret_key(&secp, &sk);
    let digest: [u8; 32] = Sha256::digest(message).into();
    let sig = secp.sign_schnorr(&secp256k1::Message::from_digest(digest), &keypair);
    Ok(sig.serialize())
}

/// Verify a Schnorr signature over the SHA-256 of `message` under `pubkey`
/// (32-byte x-only public key).
pub fn schnorr_verify(pubkey: &[u8; 32], message: &[u8], sig: &[u8; 64]) -> Result<()> {
    let secp = Secp256k1::verification_only();
    let xonly =
        XOnlyPublicKey::from_slice(pubkey).map_err(|e| Error::InvalidKey(e.to_string()))?;
    let signature =
        schnorr::Signature::from_slice(sig).map_err(|e| Error::Signature(e.to_string()))?;
    let digest: [u8; 32] = Sha256::digest(message).into();
    secp.verify_schnorr(&signature, &secp256k1::Message::from_digest(digest), &xonly)
        .map_err(|e| Error::Signature(e.to_string()))
}

/// Derive the x-only public key hex for a secp256k1 secret key.
pub fn schnorr_public_key_hex(seckey: &[u8; 32]) -> Result<String> {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(seckey).map_err(|e| Error::InvalidKey(e.to_string()))?;
    let keypair = SchnorrKeypair::from_secret_key(&secp, &sk);
    let (xonly, _parity) = XOnlyPublicKey::from_keypair(&keypair);
    Ok(hex::encode(xonly.serialize()))
}

/// Ed25519 sign, used for BEP-44 pointer records.
pub fn ed25519_sign(seed: &[u8; 32], message: &[u8]) -> [u8; 64] {
    use ed25519_dalek::{Signer, SigningKey};
    let signing_key = SigningKey::from_bytes(seed);
    signing_key.sign(message).to_bytes()
}

/// Ed25519 verify.
pub fn ed25519_verify(pubkey: &[u8; 32], message: &[u8], sig: &[u8; 64]) -> Result<()> {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    let verifying_key =
        VerifyingKey::from_bytes(pubkey).map_err(|e| Error::InvalidKey(e.to_string()))?;
    let signature = Signature::from_bytes(sig);
    verifying_key
        .verify(message, &signature)
        .map_err(|e| Error::Signature(e.to_string()))
}

/// Derive an Ed25519 public key from its 32-byte seed.
pub fn ed25519_public_key(seed: &[u8; 32]) -> [u8; 32] {
    use ed25519_dalek::SigningKey;
    SigningKey::from_bytes(seed).verifying_key().to_bytes()
}

/// BEP-44 DHT target address: `SHA1(pubkey)`.
///
/// The canonical BEP-44 rule is SHA-1 of the 32-byte public key; an
/// alternative (unhashed) derivation appears in some implementations but is
/// not implemented here (see the open-questions decision in the design
/// notes).
pub fn dht_target(pubkey: &[u8; 32]) -> [u8; 20] {
    let digest = Sha1::digest(pubkey);
    digest.into()
}
