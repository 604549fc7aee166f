//! bridge-core
//!
//! Core types, canonical encoding, and cryptographic primitives shared by
//! the relay-network and swarm-network sides of the bridge.
//!
//! # Modules
//!
//! - [`types`]: wire types (`Event`, feed index entries, DHT pointer records)
//! - [`canonical`]: deterministic encodings used for hashing and signing
//! - [`crypto`]: Schnorr (relay) and Ed25519 (DHT) signature primitives
//! - [`codec`]: event encode/decode with signature verification
//! - [`identity`]: paired node identity and attestation events
//! - [`feed_index`]: bounded time-ordered feed index
//! - [`magnet`]: magnet URI parsing and construction
//! - [`error`]: error types

pub mod canonical;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod feed_index;
pub mod identity;
pub mod magnet;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
