//! Relay information document (NIP-11-shaped) and health endpoint
//! (external interfaces §6, component design §4.12).

use crate::config::Config;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct Limitation {
    pub search_config: bool,
    pub payment_required: bool,
}

#[derive(Serialize)]
pub struct RelayInfo {
    pub name: String,
    pub description: String,
    pub pubkey: String,
    pub contact: String,
    pub supported_nips: Vec<u32>,
    pub software: String,
    pub version: String,
    pub limitation: Limitation,
}

impl RelayInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.relay_name.clone(),
            description: config.relay_description.clone(),
            pubkey: config.relay_pubkey.clone().unwrap_or_default(),
            contact: config.relay_contact.clone(),
            supported_nips: vec![1, 9, 11, 40],
            software: "relayd".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            limitation: Limitation {
                search_config: true,
                payment_required: false,
            },
        }
    }
}

/// `GET /` — serves the relay info document when the caller sends
/// `Accept: application/nostr+json`; otherwise a terse plaintext banner.
/// Websocket upgrades to the same path are handled separately in
/// [`crate::frontend`].
pub async fn info_handler(
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let wants_nip11 = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/nostr+json"))
        .unwrap_or(false);

    if wants_nip11 {
        Json(RelayInfo::from_config(&config)).into_response()
    } else {
        (StatusCode::OK, format!("{} relay\n", config.relay_name)).into_response()
    }
}

/// `GET /healthz` — liveness probe.
pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            port: 7000,
            tracker_port: 7001,
            db_path: "./data/relayd".into(),
            enable_bt: false,
            allowed_pubkeys: vec![],
            relay_name: "Test Relay".to_string(),
            relay_description: "a test relay".to_string(),
            relay_pubkey: None,
            relay_contact: "admin@example.com".to_string(),
            dht_bootstrap: vec![],
            dht_host: "0.0.0.0".to_string(),
        }
    }

    #[test]
    fn relay_info_carries_supported_nips() {
        let info = RelayInfo::from_config(&config());
        assert!(info.supported_nips.contains(&1));
        assert!(info.supported_nips.contains(&11));
    }
}
