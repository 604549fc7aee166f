//! Configuration for bridged

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// bridged - nostr-over-bt bridge daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "bridged")]
#[command(about = "Bridges relay-network events to a BitTorrent-style swarm network")]
pub struct Config {
    /// Listen address for control-plane connections
    #[arg(long, env = "BRIDGE_LISTEN", default_value = "127.0.0.1:9190")]
    pub listen: String,

    /// Data directory for persistent state (key material, caches)
    #[arg(long, env = "BRIDGE_DATA_DIR", default_value = "./data/bridged")]
    pub data_dir: PathBuf,

    /// Relay websocket URLs to publish/subscribe against (comma-separated)
    #[arg(long, env = "BRIDGE_RELAYS", value_delimiter = ',')]
    pub relays: Vec<String>,

    /// Relay secret key, hex-encoded. If absent a random swarm key is
    /// generated and held only in memory.
    #[arg(long, env = "BRIDGE_RELAY_SECRET")]
    pub relay_secret: Option<String>,

    /// Swarm trackers to announce to (comma-separated)
    #[arg(long, env = "BRIDGE_TRACKERS", value_delimiter = ',')]
    pub trackers: Vec<String>,

    /// DHT bootstrap nodes (comma-separated host:port)
    #[arg(long, env = "BRIDGE_DHT_BOOTSTRAP", value_delimiter = ',')]
    pub dht_bootstrap: Vec<String>,

    /// Maximum entries retained in a published feed index
    #[arg(long, env = "BRIDGE_FEED_LIMIT", default_value = "100")]
    pub feed_limit: u32,

    /// Maximum web-of-trust degree to sync
    #[arg(long, env = "BRIDGE_MAX_DEGREE", default_value = "2")]
    pub max_degree: u8,

    /// Log format (json or pretty)
    #[arg(long, env = "BRIDGE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.relays.is_empty() {
            anyhow::bail!("at least one relay must be configured via --relays/BRIDGE_RELAYS");
        }
        if let Some(secret) = &self.relay_secret {
            let bytes = hex::decode(secret)
                .map_err(|e| anyhow::anyhow!("BRIDGE_RELAY_SECRET must be hex: {e}"))?;
            if bytes.len() != 32 {
                anyhow::bail!(
                    "BRIDGE_RELAY_SECRET must decode to 32 bytes, got {}",
                    bytes.len()
                );
            }
        }
        Ok(())
    }

    pub fn relay_secret_bytes(&self) -> anyhow::Result<Option<[u8; 32]>> {
        match &self.relay_secret {
            Some(secret) => {
                let bytes = hex::decode(secret)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("relay secret must be 32 bytes"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}

/// Persisted node state, written under `data_dir` so identity survives
/// restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    /// Relay (Schnorr) secret, reused as the Ed25519 seed per
    /// `IdentityStore::from_relay_secret`.
    pub relay_secret: [u8; 32],
    /// Running feed pointer sequence number, persisted so restarts don't
    /// stall on a stale `seq`.
    pub feed_seq: u64,
}
