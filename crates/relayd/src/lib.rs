//! relayd - relay-network relay with swarm seeding
//!
//! Serves the relay-network ingest/query protocol over a websocket,
//! persists accepted events in an embedded store, and (when `ENABLE_BT`
//! is set) hands newly inserted events to a seeding queue so they land
//! in the swarm.
//!
//! # Modules
//!
//! - [`config`]: CLI/env configuration
//! - [`storage`]: embedded event store with replaceable-kind and
//!   full-text-search secondary indices
//! - [`frontend`]: websocket ingest/query loop
//! - [`whitelist`]: publisher allowlist (hex or `npub1` pubkeys)
//! - [`info`]: NIP-11-shaped relay information document and healthz

pub mod config;
pub mod frontend;
pub mod info;
pub mod storage;
pub mod whitelist;

pub use config::Config;
pub use frontend::FrontendState;
pub use storage::RelayStore;
pub use whitelist::Whitelist;
