//! bridged - nostr-over-bt bridge daemon
//!
//! Publishes relay-network events into a BitTorrent-style swarm, keeps a
//! node's feed index and DHT pointer record current, and syncs a
//! web-of-trust follow graph so followed nodes' feeds are discoverable.
//!
//! # Modules
//!
//! - [`config`]: CLI/env configuration and persisted node state
//! - [`feed_manager`]: per-node feed index and DHT pointer record
//! - [`feed_tracker`]: DHT-then-relay discovery of remote feeds
//! - [`wot`]: web-of-trust graph
//! - [`coordinator`]: top-level orchestration
//! - [`error`]: daemon-local error type
//!
//! The seeding worker pool itself ([`bridge_net::SeedingQueue`]) lives in
//! `bridge-net` since `relayd` shares it.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed_manager;
pub mod feed_tracker;
pub mod wot;

pub use config::Config;
pub use coordinator::TransportCoordinator;
pub use error::{Error, Result};
pub use feed_manager::FeedManager;
pub use feed_tracker::FeedTracker;
pub use wot::WoTGraph;
