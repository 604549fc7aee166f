//! relayd - relay-network relay daemon
//!
//! Serves the ingest/query websocket protocol, persists accepted events,
//! and seeds them into the swarm network when `ENABLE_BT` is set.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRef, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bridge_net::{SeedingQueue, SwarmClient};
use clap::Parser;
use relayd::config::Config;
use relayd::frontend::{self, FrontendState};
use relayd::info::{healthz_handler, info_handler};
use relayd::storage::RelayStore;
use relayd::whitelist::Whitelist;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    frontend: Arc<FrontendState>,
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<FrontendState> {
    fn from_ref(state: &AppState) -> Self {
        state.frontend.clone()
    }
}

/// `GET /` dispatches to the websocket ingest/query loop on an upgrade
/// request, or the NIP-11-shaped info document otherwise.
async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    State(app): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match ws {
        Some(ws) => frontend::ws_handler(ws, State(app.frontend)).await.into_response(),
        None => info_handler(State(app.config), headers).await.into_response(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("relayd=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }
    info!("relayd v{} starting on port {}", env!("CARGO_PKG_VERSION"), config.port);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(mut config: Config) -> anyhow::Result<()> {
    if config.relay_pubkey.is_none() {
        let identity = bridge_core::identity::IdentityStore::generate();
        let pubkey = identity.public_key_hex()?;
        info!(%pubkey, "no RELAY_PUBKEY configured, generated an ephemeral one for the info document");
        config.relay_pubkey = Some(pubkey);
    }

    let store = RelayStore::open(&config.db_path)?;
    let whitelist = Whitelist::new(&config.allowed_pubkeys);

    let seeding_queue = if config.enable_bt {
        let swarm = bridge_net::swarm::InMemorySwarmClient::new();
        for tracker in &config.dht_bootstrap {
            swarm.announce_tracker(tracker.clone()).await;
        }
        Some(SeedingQueue::new(4, move |event| {
            let swarm = swarm.clone();
            async move {
                use bridge_core::codec::EventCodec;
                use bridge_net::SeedRequest;
                let buffer = EventCodec::encode(&event).map_err(|e| e.to_string())?;
                let filename = EventCodec::filename(&event);
                swarm
                    .seed(SeedRequest { buffer, filename })
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
        }))
    } else {
        None
    };

    let frontend_state = Arc::new(FrontendState::new(store, whitelist, seeding_queue));
    let app_state = AppState {
        config: Arc::new(config.clone()),
        frontend: frontend_state,
    };

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
        })
        .await?;
    Ok(())
}
