//! RelayClient: publish/subscribe against relay-network relays
//! (component design §4.6).

use crate::error::{Error, Result};
use async_trait::async_trait;
use bridge_core::types::Event;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::Message;

/// A relay subscription filter. Field names match the wire filter object
/// (`external interfaces` §6); absent fields match anything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// `#e`, `#p`, `#d`, ... tag-value predicates, keyed by the single-char
    /// tag name without the leading `#`.
    #[serde(flatten)]
    pub tag_filters: HashMap<String, Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }

    pub fn kinds(mut self, kinds: Vec<u32>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn tag(mut self, name: &str, values: Vec<String>) -> Self {
        self.tag_filters.insert(format!("#{name}"), values);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `event` matches every constraint set on this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.contains(&event.pubkey) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at > until {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !event.content.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        for (key, values) in &self.tag_filters {
            let Some(name) = key.strip_prefix('#') else {
                continue;
            };
            if !event.tag_values(name).any(|v| values.iter().any(|want| want == v)) {
                return false;
            }
        }
        true
    }
}

/// Handle to a live subscription. Dropping it does not cancel delivery;
/// call [`Subscription::close`] explicitly.
pub struct Subscription {
    id: String,
    close: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn close(mut self) {
        if let Some(close) = self.close.take() {
            close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(close) = self.close.take() {
            close();
        }
    }
}

/// Capability set shared by every relay transport: loopback test double and
/// real websocket client alike.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Publish an event. Succeeds if at least one relay acknowledges it.
    async fn publish(&self, event: Event) -> Result<()>;

    /// Subscribe to events matching `filter`. `on_event` is invoked for
    /// each matching event as it arrives.
    async fn subscribe(
        &self,
        filter: Filter,
        on_event: Box<dyn Fn(Event) + Send + Sync>,
    ) -> Result<Subscription>;

    /// Subscribe, resolve on the first event for which `predicate` returns
    /// true, and close on success or timeout.
    async fn await_event(
        &self,
        filter: Filter,
        timeout: Duration,
        predicate: Box<dyn for<'r> Fn(&'r Event) -> bool + Send + Sync>,
    ) -> Result<Option<Event>> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sub = self
            .subscribe(
                filter,
                Box::new(move |event| {
                    if predicate(&event) {
                        let _ = tx.send(event);
                    }
                }),
            )
            .await?;
        let result = tokio::time::timeout(timeout, rx.recv()).await.ok().flatten();
        sub.close();
        Ok(result)
    }
}

struct LoopbackSubscriber {
    id: String,
    filter: Filter,
    on_event: Box<dyn Fn(Event) + Send + Sync>,
}

/// In-process relay double: `publish` fans an event out to every live
/// `subscribe` call whose filter matches. No network I/O.
#[derive(Clone)]
pub struct LoopbackRelayClient {
    subscribers: Arc<Mutex<Vec<LoopbackSubscriber>>>,
    published: Arc<Mutex<Vec<Event>>>,
    next_sub_id: Arc<AtomicU64>,
}

impl Default for LoopbackRelayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackRelayClient {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            published: Arc::new(Mutex::new(Vec::new())),
            next_sub_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Snapshot of every event ever published through this client, for
    /// assertions in tests.
    pub async fn published_events(&self) -> Vec<Event> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl RelayClient for LoopbackRelayClient {
    async fn publish(&self, event: Event) -> Result<()> {
        self.published.lock().await.push(event.clone());
        let subscribers = self.subscribers.lock().await;
        for sub in subscribers.iter() {
            if sub.filter.matches(&event) {
                (sub.on_event)(event.clone());
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        filter: Filter,
        on_event: Box<dyn Fn(Event) + Send + Sync>,
    ) -> Result<Subscription> {
        let id = format!("sub-{}", self.next_sub_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().await.push(LoopbackSubscriber {
            id: id.clone(),
            filter,
            on_event,
        });
        let subscribers = self.subscribers.clone();
        let close_id = id.clone();
        Ok(Subscription {
            id,
            close: Some(Box::new(move || {
                let subscribers = subscribers.clone();
                tokio::spawn(async move {
                    subscribers.lock().await.retain(|s| s.id != close_id);
                });
            })),
        })
    }
}

/// Talks NIP-01-shaped relay frames over a websocket connection.
pub struct WebSocketRelayClient {
    outbound: broadcast::Sender<Message>,
    subscriptions: Arc<Mutex<HashMap<String, (Filter, Box<dyn Fn(Event) + Send + Sync>)>>>,
    next_sub_id: Arc<AtomicU64>,
}

impl WebSocketRelayClient {
    /// Connect to `url` and spawn the background read loop. The client
    /// remains usable even if the initial connection fails; publishes and
    /// subscribes against a dead connection surface as `TransportError`.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::nostr(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = broadcast::channel::<Message>(256);
        let subscriptions: Arc<Mutex<HashMap<String, (Filter, Box<dyn Fn(Event) + Send + Sync>)>>> =
            Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Ok(msg) = outbound_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let read_subscriptions = subscriptions.clone();
        tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                let Message::Text(text) = msg else { continue };
                let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                    continue;
                };
                let Some(arr) = value.as_array() else { continue };
                if arr.len() < 3 || arr[0].as_str() != Some("EVENT") {
                    continue;
                }
                let Some(sub_id) = arr[1].as_str() else { continue };
                let Ok(event) = serde_json::from_value::<Event>(arr[2].clone()) else {
                    continue;
                };
                let subs = read_subscriptions.lock().await;
                if let Some((filter, on_event)) = subs.get(sub_id) {
                    if filter.matches(&event) {
                        on_event(event);
                    }
                }
            }
        });

        Ok(Self {
            outbound: outbound_tx,
            subscriptions,
            next_sub_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn send_frame(&self, value: serde_json::Value) -> Result<()> {
        let text = serde_json::to_string(&value).map_err(bridge_core::Error::from)?;
        self.outbound
            .send(Message::Text(text))
            .map(|_| ())
            .map_err(|e| Error::nostr(e.to_string()))
    }
}

#[async_trait]
impl RelayClient for WebSocketRelayClient {
    async fn publish(&self, event: Event) -> Result<()> {
        self.send_frame(serde_json::json!(["EVENT", event]))
    }

    async fn subscribe(
        &self,
        filter: Filter,
        on_event: Box<dyn Fn(Event) + Send + Sync>,
    ) -> Result<Subscription> {
        let id = format!("sub-{}", self.next_sub_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .lock()
            .await
            .insert(id.clone(), (filter.clone(), on_event));
        self.send_frame(serde_json::json!(["REQ", id, filter]))?;

        let subscriptions = self.subscriptions.clone();
        let close_id = id.clone();
        let outbound = self.outbound.clone();
        Ok(Subscription {
            id,
            close: Some(Box::new(move || {
                let subscriptions = subscriptions.clone();
                let sub_id = close_id.clone();
                let _ = outbound.send(Message::Text(
                    serde_json::to_string(&serde_json::json!(["CLOSE", sub_id])).unwrap_or_default(),
                ));
                tokio::spawn(async move {
                    subscriptions.lock().await.remove(&sub_id);
                });
            })),
        })
    }
}
