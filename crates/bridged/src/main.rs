//! bridged - nostr-over-bt bridge daemon
//!
//! Connects to configured relays, maintains this node's feed index and
//! DHT pointer record, and keeps its web-of-trust graph in sync.

use bridge_core::identity::IdentityStore;
use bridge_net::dht::InMemoryDht;
use bridge_net::relay::{RelayClient, WebSocketRelayClient};
use bridge_net::swarm::InMemorySwarmClient;
use bridge_net::{SeedingQueue, SwarmClient};
use bridged::config::Config;
use bridged::{FeedManager, FeedTracker, TransportCoordinator, WoTGraph};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("bridged=info".parse().unwrap()));
    if config.log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "bridged v{} starting, relays={:?}",
        env!("CARGO_PKG_VERSION"),
        config.relays
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let relay_secret = config
        .relay_secret_bytes()?
        .unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut seed);
            seed
        });
    let identity = Arc::new(IdentityStore::from_relay_secret(relay_secret));
    info!(pubkey = %identity.public_key_hex()?, "node identity ready");

    let relay_url = config
        .relays
        .first()
        .ok_or_else(|| anyhow::anyhow!("no relay configured"))?;
    let relay: Arc<dyn RelayClient> = Arc::new(WebSocketRelayClient::connect(relay_url).await?);

    let swarm = Arc::new(InMemorySwarmClient::new());
    for tracker in &config.trackers {
        swarm.announce_tracker(tracker.clone()).await;
    }
    let dht = Arc::new(InMemoryDht::new());

    let feed_manager = Arc::new(FeedManager::new(
        identity.clone(),
        swarm.clone(),
        dht.clone(),
        config.feed_limit as usize,
    ));
    feed_manager.sync_sequence().await;

    let feed_tracker = Arc::new(FeedTracker::new(
        feed_manager.clone(),
        relay.clone(),
        config.trackers.clone(),
        256,
    ));
    let wot = Arc::new(WoTGraph::new(config.max_degree));

    let coordinator = Arc::new(TransportCoordinator::new(
        relay,
        swarm,
        Some(feed_manager),
        Some(feed_tracker),
        Some(wot),
        None::<Arc<SeedingQueue>>,
    ));

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
    });

    if let Err(e) = coordinator.sync_wot_recursive().await {
        tracing::warn!(%e, "initial web-of-trust sync failed");
    }

    tokio::signal::ctrl_c().await?;
    coordinator.shutdown().await;
    Ok(())
}
