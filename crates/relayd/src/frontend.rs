//! Ingest/query websocket frontend (component design §4.12): `EVENT` /
//! `REQ` / `CLOSE` frames, whitelist enforcement, and broadcast fan-out
//! to live subscribers.

use crate::storage::{EventFilter, RelayStore};
use crate::whitelist::Whitelist;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use bridge_core::codec::EventCodec;
use bridge_core::types::Event;
use bridge_net::SeedingQueue;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared state handed to every websocket connection.
pub struct FrontendState {
    pub store: RelayStore,
    pub whitelist: Whitelist,
    pub seeding_queue: Option<SeedingQueue>,
    pub broadcast: broadcast::Sender<Event>,
}

impl FrontendState {
    pub fn new(store: RelayStore, whitelist: Whitelist, seeding_queue: Option<SeedingQueue>) -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            store,
            whitelist,
            seeding_queue,
            broadcast: tx,
        }
    }
}

/// Wire-shaped filter, matching the external `REQ` filter object
/// (external interfaces §6): `#e`/`#p`/`#d`/... tag predicates are
/// flattened alongside the named fields.
#[derive(Debug, Clone, Default, Deserialize)]
struct WireFilter {
    ids: Option<Vec<String>>,
    authors: Option<Vec<String>>,
    kinds: Option<Vec<u32>>,
    since: Option<u64>,
    until: Option<u64>,
    limit: Option<usize>,
    search: Option<String>,
    #[serde(flatten)]
    tag_filters: HashMap<String, Vec<String>>,
}

impl From<WireFilter> for EventFilter {
    fn from(wire: WireFilter) -> Self {
        let tags = wire
            .tag_filters
            .into_iter()
            .filter_map(|(key, values)| {
                let mut chars = key.strip_prefix('#')?.chars();
                let name = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Some((name, values))
            })
            .collect();
        EventFilter {
            ids: wire.ids,
            authors: wire.authors,
            kinds: wire.kinds,
            since: wire.since,
            until: wire.until,
            limit: wire.limit,
            search: wire.search,
            tags,
        }
    }
}

struct LiveSubscription {
    id: String,
    filter: EventFilter,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<FrontendState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<FrontendState>) {
    let (mut write, mut read) = {
        use futures_util::StreamExt;
        socket.split()
    };
    use futures_util::SinkExt;

    let mut subs: Vec<LiveSubscription> = Vec::new();
    let mut events_rx = state.broadcast.subscribe();

    loop {
        tokio::select! {
            incoming = futures_util::StreamExt::next(&mut read) => {
                let Some(Ok(msg)) = incoming else { break };
                let Message::Text(text) = msg else { continue };
                for frame in handle_frame(&state, &mut subs, &text).await {
                    if write.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
            }
            broadcast_event = events_rx.recv() => {
                let Ok(event) = broadcast_event else { continue };
                for sub in &subs {
                    if state.store_matches(&event, &sub.filter) {
                        let frame = json!(["EVENT", sub.id, event]).to_string();
                        if write.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl FrontendState {
    fn store_matches(&self, event: &Event, filter: &EventFilter) -> bool {
        // Re-derive the boolean predicate storage uses for persisted
        // queries, applied to a single in-flight event.
        if let Some(ids) = &filter.ids {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some(authors) = &filter.authors {
            if !authors.contains(&event.pubkey) {
                return false;
            }
        }
        if let Some(kinds) = &filter.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(since) = filter.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = filter.until {
            if event.created_at > until {
                return false;
            }
        }
        for (name, values) in &filter.tags {
            if !event
                .tag_values(&name.to_string())
                .any(|v| values.iter().any(|want| want == v))
            {
                return false;
            }
        }
        if let Some(search) = &filter.search {
            if !event.content.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Process one inbound text frame, returning zero or more outbound frames
/// to send back on this connection.
async fn handle_frame(
    state: &Arc<FrontendState>,
    subs: &mut Vec<LiveSubscription>,
    text: &str,
) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return vec![json!(["NOTICE", "invalid frame: not JSON"]).to_string()];
    };
    let Some(array) = value.as_array() else {
        return vec![json!(["NOTICE", "invalid frame: not an array"]).to_string()];
    };
    let Some(frame_type) = array.first().and_then(|v| v.as_str()) else {
        return vec![json!(["NOTICE", "invalid frame: missing type"]).to_string()];
    };

    match frame_type {
        "EVENT" => handle_event(state, array).await,
        "REQ" => handle_req(state, subs, array),
        "CLOSE" => {
            if let Some(sub_id) = array.get(1).and_then(|v| v.as_str()) {
                subs.retain(|s| s.id != sub_id);
            }
            vec![]
        }
        other => vec![json!(["NOTICE", format!("unknown frame type: {other}")]).to_string()],
    }
}

async fn handle_event(state: &Arc<FrontendState>, array: &[Value]) -> Vec<String> {
    let Some(raw) = array.get(1) else {
        return vec![json!(["NOTICE", "EVENT frame missing payload"]).to_string()];
    };
    let event: Event = match serde_json::from_value(raw.clone()) {
        Ok(e) => e,
        Err(err) => {
            return vec![json!(["NOTICE", format!("malformed event: {err}")]).to_string()]
        }
    };

    if !state.whitelist.allows(&event.pubkey) {
        return vec![json!(["OK", event.id, false, "blocked: pubkey not whitelisted"]).to_string()];
    }

    match EventCodec::verify(&event) {
        Ok(true) => {}
        Ok(false) => {
            return vec![json!(["OK", event.id, false, "invalid: bad signature"]).to_string()]
        }
        Err(err) => {
            return vec![json!(["OK", event.id, false, format!("invalid: {err}")]).to_string()]
        }
    }

    let outcome = match state.store.save_event(&event) {
        Ok(o) => o,
        Err(err) => {
            return vec![json!(["OK", event.id, false, format!("error: {err}")]).to_string()]
        }
    };

    if outcome.inserted {
        if let Some(queue) = &state.seeding_queue {
            queue.enqueue(event.clone());
        }
        let _ = state.broadcast.send(event.clone());
    }

    vec![json!(["OK", event.id, true, ""]).to_string()]
}

fn handle_req(
    state: &Arc<FrontendState>,
    subs: &mut Vec<LiveSubscription>,
    array: &[Value],
) -> Vec<String> {
    let Some(sub_id) = array.get(1).and_then(|v| v.as_str()) else {
        return vec![json!(["NOTICE", "REQ frame missing subscription id"]).to_string()];
    };

    let mut merged = Vec::new();
    let mut filters = Vec::new();
    for raw_filter in &array[2..] {
        let wire: WireFilter = match serde_json::from_value(raw_filter.clone()) {
            Ok(f) => f,
            Err(err) => {
                return vec![json!(["NOTICE", format!("malformed filter: {err}")]).to_string()]
            }
        };
        filters.push(EventFilter::from(wire));
    }
    if filters.is_empty() {
        filters.push(EventFilter::default());
    }

    for filter in &filters {
        match state.store.query_events(filter) {
            Ok(events) => merged.extend(events),
            Err(err) => {
                return vec![json!(["NOTICE", format!("query failed: {err}")]).to_string()]
            }
        }
    }
    merged.sort_by(|a: &Event, b: &Event| b.created_at.cmp(&a.created_at));
    merged.dedup_by(|a, b| a.id == b.id);

    subs.retain(|s| s.id != sub_id);
    subs.push(LiveSubscription {
        id: sub_id.to_string(),
        filter: filters.into_iter().next().unwrap_or_default(),
    });

    let mut out: Vec<String> = merged
        .into_iter()
        .map(|event| json!(["EVENT", sub_id, event]).to_string())
        .collect();
    out.push(json!(["EOSE", sub_id]).to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::canonical::{compute_event_id, event_sign_bytes};
    use bridge_core::crypto::{schnorr_public_key_hex, schnorr_sign};

    fn signed_event(seed: [u8; 32], content: &str) -> Event {
        let pubkey = schnorr_public_key_hex(&seed).unwrap();
        let created_at = 1_700_000_000;
        let kind = 1;
        let tags = vec![];
        let sign_bytes = event_sign_bytes(&pubkey, created_at, kind, &tags, content).unwrap();
        let sig = schnorr_sign(&seed, &sign_bytes).unwrap();
        let id = compute_event_id(&pubkey, created_at, kind, &tags, content).unwrap();
        Event {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content: content.to_string(),
            sig: hex::encode(sig),
        }
    }

    fn state() -> Arc<FrontendState> {
        let dir = tempfile::tempdir().unwrap();
        let store = RelayStore::open(dir.path().join("db")).unwrap();
        Arc::new(FrontendState::new(store, Whitelist::new(&[]), None))
    }

    #[tokio::test]
    async fn event_frame_accepts_valid_signed_event() {
        let state = state();
        let event = signed_event([1u8; 32], "hello");
        let array = vec![json!("EVENT"), serde_json::to_value(&event).unwrap()];
        let out = handle_event(&state, &array).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("true"));
        assert_eq!(state.store.event_count(), 1);
    }

    #[tokio::test]
    async fn event_frame_rejects_tampered_signature() {
        let state = state();
        let mut event = signed_event([2u8; 32], "hello");
        event.content = "tampered".to_string();
        let array = vec![json!("EVENT"), serde_json::to_value(&event).unwrap()];
        let out = handle_event(&state, &array).await;
        assert!(out[0].contains("false"));
        assert_eq!(state.store.event_count(), 0);
    }

    #[tokio::test]
    async fn event_frame_rejects_non_whitelisted_pubkey() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelayStore::open(dir.path().join("db")).unwrap();
        let state = Arc::new(FrontendState::new(
            store,
            Whitelist::new(&["a".repeat(64)]),
            None,
        ));
        let event = signed_event([3u8; 32], "hello");
        let array = vec![json!("EVENT"), serde_json::to_value(&event).unwrap()];
        let out = handle_event(&state, &array).await;
        assert!(out[0].contains("false"));
        assert_eq!(state.store.event_count(), 0);
    }

    #[test]
    fn req_frame_streams_matches_then_eose() {
        let state = state();
        let event = signed_event([4u8; 32], "hello");
        state.store.save_event(&event).unwrap();

        let mut subs = Vec::new();
        let array = vec![json!("REQ"), json!("sub1"), json!({"kinds": [1]})];
        let out = handle_req(&state, &mut subs, &array);
        assert_eq!(out.len(), 2);
        assert!(out[0].contains("EVENT"));
        assert!(out[1].contains("EOSE"));
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn close_frame_removes_subscription() {
        let mut subs = vec![LiveSubscription {
            id: "sub1".to_string(),
            filter: EventFilter::default(),
        }];
        subs.retain(|s| s.id != "sub1");
        assert!(subs.is_empty());
    }

    #[test]
    fn wire_filter_converts_hash_tag_predicates() {
        let wire: WireFilter = serde_json::from_value(json!({"#d": ["profile"]})).unwrap();
        let filter: EventFilter = wire.into();
        assert_eq!(filter.tags, vec![('d', vec!["profile".to_string()])]);
    }
}
