//! relayd configuration

use clap::Parser;
use std::path::PathBuf;

/// relayd - relay-network relay with swarm seeding
#[derive(Parser, Debug, Clone)]
#[command(name = "relayd")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Relay websocket/HTTP listen port
    #[arg(long, env = "PORT", default_value = "7000")]
    pub port: u16,

    /// BitTorrent tracker listen port
    #[arg(long, env = "TRACKER_PORT", default_value = "7001")]
    pub tracker_port: u16,

    /// Path to the sled database directory
    #[arg(long, env = "DB_PATH", default_value = "./data/relayd")]
    pub db_path: PathBuf,

    /// Whether to seed accepted events into the swarm
    #[arg(long, env = "ENABLE_BT", default_value = "true")]
    pub enable_bt: bool,

    /// Whitelisted publisher pubkeys (hex or npub1... bech32), comma-separated.
    /// Empty means no whitelist enforcement.
    #[arg(long, env = "ALLOWED_PUBKEYS", value_delimiter = ',')]
    pub allowed_pubkeys: Vec<String>,

    /// Relay display name, used in the NIP-11 info document
    #[arg(long, env = "RELAY_NAME", default_value = "nostr-over-bt relay")]
    pub relay_name: String,

    #[arg(long, env = "RELAY_DESCRIPTION", default_value = "")]
    pub relay_description: String,

    #[arg(long, env = "RELAY_PUBKEY")]
    pub relay_pubkey: Option<String>,

    #[arg(long, env = "RELAY_CONTACT", default_value = "")]
    pub relay_contact: String,

    /// DHT bootstrap nodes (comma-separated host:port)
    #[arg(long, env = "DHT_BOOTSTRAP", value_delimiter = ',')]
    pub dht_bootstrap: Vec<String>,

    #[arg(long, env = "DHT_HOST", default_value = "0.0.0.0")]
    pub dht_host: String,
}

impl Config {
    /// Cross-field checks beyond what clap's per-arg parsing covers. A
    /// configured `RELAY_PUBKEY` must be valid hex; if absent, `main`
    /// generates one for the info document at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(pubkey) = &self.relay_pubkey {
            let bytes = hex::decode(pubkey)
                .map_err(|e| anyhow::anyhow!("RELAY_PUBKEY must be hex: {e}"))?;
            if bytes.len() != 32 {
                anyhow::bail!("RELAY_PUBKEY must decode to 32 bytes, got {}", bytes.len());
            }
        }
        if self.port == self.tracker_port {
            anyhow::bail!("PORT and TRACKER_PORT must differ");
        }
        Ok(())
    }
}
