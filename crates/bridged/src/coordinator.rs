//! TransportCoordinator: top-level orchestration of publish, discovery,
//! and web-of-trust sync (component design §4.8).

use crate::feed_manager::FeedManager;
use crate::feed_tracker::FeedTracker;
use crate::wot::WoTGraph;
use bridge_core::codec::EventCodec;
use bridge_core::feed_index::FeedIndex;
use bridge_core::magnet::MagnetUri;
use bridge_core::types::{Event, IndexEntry, D_TAG_IDENTITY, KIND_BRIDGE};
use bridge_net::relay::{Filter, RelayClient};
use bridge_net::seeding_queue::SeedingQueue;
use bridge_net::swarm::{SeedRequest, SwarmClient};
use bridge_net::{Error as NetError, Result as NetResult};
use lru::LruCache;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

const KEY_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of `publish`: the event's own magnet, any media magnets seeded
/// alongside it, and the relay's acknowledgement. `relay_status` is always
/// `"OK"` here — a rejected publish returns `Err` before a `PublishOutcome`
/// is ever built.
pub struct PublishOutcome {
    pub magnet: MagnetUri,
    pub media_magnets: Vec<MagnetUri>,
    pub relay_status: String,
}

/// Either a resolved magnet or a marker that the work was handed to the
/// background seeding queue.
#[derive(Debug, Clone)]
pub enum ReseedOutcome {
    Magnet(MagnetUri),
    Queued(String),
}

/// Owns every transport-facing handle a bridge node needs and exposes the
/// high-level operations the rest of the system drives.
pub struct TransportCoordinator {
    relay: Arc<dyn RelayClient>,
    swarm: Arc<dyn SwarmClient>,
    feed_manager: Option<Arc<FeedManager>>,
    feed_tracker: Option<Arc<FeedTracker>>,
    wot: Option<Arc<WoTGraph>>,
    seeding_queue: Option<Arc<SeedingQueue>>,
    key_cache: SyncMutex<LruCache<String, String>>,
    magnet_cache: SyncMutex<LruCache<String, MagnetUri>>,
    http: reqwest::Client,
    subscriptions: AsyncMutex<Vec<bridge_net::relay::Subscription>>,
}

impl TransportCoordinator {
    pub fn new(
        relay: Arc<dyn RelayClient>,
        swarm: Arc<dyn SwarmClient>,
        feed_manager: Option<Arc<FeedManager>>,
        feed_tracker: Option<Arc<FeedTracker>>,
        wot: Option<Arc<WoTGraph>>,
        seeding_queue: Option<Arc<SeedingQueue>>,
    ) -> Self {
        Self {
            relay,
            swarm,
            feed_manager,
            feed_tracker,
            wot,
            seeding_queue,
            key_cache: SyncMutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())),
            magnet_cache: SyncMutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())),
            http: reqwest::Client::new(),
            subscriptions: AsyncMutex::new(Vec::new()),
        }
    }

    /// Publish `event` to the relay network, then seed it (and any media)
    /// into the swarm. Seeding is deferred: if the relay publish fails no
    /// swarm artifact is created at all.
    pub async fn publish(&self, event: Event, media: Vec<Vec<u8>>) -> NetResult<PublishOutcome> {
        self.relay.publish(event.clone()).await.map_err(|e| {
            NetError::nostr(format!("publish rejected: {e}"))
        })?;

        let bytes = EventCodec::encode(&event).map_err(NetError::from)?;
        let magnet = self
            .swarm
            .seed(SeedRequest {
                buffer: bytes,
                filename: EventCodec::filename(&event),
            })
            .await?;

        let mut media_futures = Vec::new();
        for (i, buffer) in media.into_iter().enumerate() {
            let swarm = self.swarm.clone();
            let filename = format!("{}.media{i}", event.id);
            media_futures.push(async move {
                swarm.seed(SeedRequest { buffer, filename }).await
            });
        }
        let media_magnets = futures_util::future::try_join_all(media_futures).await?;

        self.magnet_cache.lock().put(event.id.clone(), magnet.clone());

        Ok(PublishOutcome {
            magnet,
            media_magnets,
            relay_status: "OK".to_string(),
        })
    }

    /// Seed `event` and fold it into this node's feed index. Requires a
    /// configured `FeedManager`.
    pub async fn publish_p2p(&self, event: Event) -> NetResult<MagnetUri> {
        let feed_manager = self
            .feed_manager
            .as_ref()
            .ok_or_else(|| NetError::core("publish_p2p requires a configured FeedManager"))?;

        let bytes = EventCodec::encode(&event).map_err(NetError::from)?;
        let event_magnet = self
            .swarm
            .seed(SeedRequest {
                buffer: bytes,
                filename: EventCodec::filename(&event),
            })
            .await?;

        let update = feed_manager
            .update_feed(&event, event_magnet.encode(), None)
            .await?;
        Ok(update.magnet)
    }

    /// Fetch a remote node's feed index over the swarm and return its
    /// entries, or an empty list if the node couldn't be discovered.
    pub async fn subscribe_p2p(
        &self,
        transport_pubkey: &str,
        relay_pubkey: Option<&str>,
    ) -> NetResult<Vec<IndexEntry>> {
        let Some(feed_tracker) = &self.feed_tracker else {
            return Ok(Vec::new());
        };
        let Some(magnet) = feed_tracker.discover(transport_pubkey, relay_pubkey).await? else {
            return Ok(Vec::new());
        };
        let bytes = self.swarm.fetch(&magnet, Duration::from_secs(5)).await?;
        let index = FeedIndex::from_bytes(&bytes, usize::MAX);
        Ok(index.items().to_vec())
    }

    /// Resolve a magnet for `event`, seeding it if necessary. In
    /// background mode the seed happens on the shared `SeedingQueue` and
    /// this returns immediately with a queued marker.
    pub async fn reseed_event(&self, event: Event, background: bool) -> NetResult<ReseedOutcome> {
        if let Some(cached) = self.magnet_cache.lock().get(&event.id) {
            return Ok(ReseedOutcome::Magnet(cached.clone()));
        }
        if let Some(bt_tag) = event.tag_value("bt") {
            let magnet = MagnetUri::decode(bt_tag).map_err(NetError::from)?;
            self.magnet_cache.lock().put(event.id.clone(), magnet.clone());
            return Ok(ReseedOutcome::Magnet(magnet));
        }

        if background {
            if let Some(queue) = &self.seeding_queue {
                let id = event.id.clone();
                queue.enqueue(event);
                return Ok(ReseedOutcome::Queued(format!("queued:{id}")));
            }
        }

        let magnet = self.seed_and_update(&event).await?;
        self.magnet_cache.lock().put(event.id.clone(), magnet.clone());
        Ok(ReseedOutcome::Magnet(magnet))
    }

    async fn seed_and_update(&self, event: &Event) -> NetResult<MagnetUri> {
        let bytes = EventCodec::encode(event).map_err(NetError::from)?;
        let magnet = self
            .swarm
            .seed(SeedRequest {
                buffer: bytes,
                filename: EventCodec::filename(event),
            })
            .await?;
        if let Some(feed_manager) = &self.feed_manager {
            feed_manager.update_feed(event, magnet.encode(), None).await?;
        }
        Ok(magnet)
    }

    /// Fetch media for `event`: a `bt` magnet tag first, falling back to
    /// `url`/`image`/`video` tags over HTTP. BT failures are swallowed
    /// until every fallback is exhausted.
    pub async fn fetch_media(&self, event: &Event) -> NetResult<Vec<u8>> {
        if let Some(bt_tag) = event.tag_value("bt") {
            if let Ok(magnet) = MagnetUri::decode(bt_tag) {
                if let Ok(bytes) = self.swarm.fetch(&magnet, Duration::from_secs(5)).await {
                    return Ok(bytes);
                }
            }
        }

        for tag_name in ["url", "image", "video"] {
            if let Some(url) = event.tag_value(tag_name) {
                if let Ok(response) = self.http.get(url).send().await {
                    if let Ok(bytes) = response.bytes().await {
                        return Ok(bytes.to_vec());
                    }
                }
            }
        }

        Err(NetError::bt("no media source resolved"))
    }

    /// Resolve a relay pubkey's swarm (transport) pubkey via its
    /// attestation event, caching hits.
    pub async fn resolve_transport_key(&self, relay_pubkey: &str) -> NetResult<Option<String>> {
        if let Some(cached) = self.key_cache.lock().get(relay_pubkey) {
            return Ok(Some(cached.clone()));
        }

        let filter = Filter::new()
            .authors(vec![relay_pubkey.to_string()])
            .kinds(vec![KIND_BRIDGE])
            .tag("d", vec![D_TAG_IDENTITY.to_string()])
            .limit(1);
        let event = self
            .relay
            .await_event(
                filter,
                KEY_RESOLVE_TIMEOUT,
                Box::new(|event| event.content.len() == 64),
            )
            .await?;

        let Some(event) = event else { return Ok(None) };
        self.key_cache.lock().put(relay_pubkey.to_string(), event.content.clone());
        Ok(Some(event.content))
    }

    /// Seed a relay pubkey's contact list into the web-of-trust graph at
    /// `degree`. Requires a configured `WoTGraph`.
    pub async fn bootstrap_wot(
        &self,
        transport_pubkey: &str,
        relay_pubkey: Option<&str>,
        degree: u8,
    ) -> NetResult<()> {
        let Some(wot) = &self.wot else {
            return Ok(());
        };
        let entries = self.subscribe_p2p(transport_pubkey, relay_pubkey).await?;
        let Some(entry) = entries.into_iter().find(|entry| entry.kind == 3) else {
            return Ok(());
        };
        let magnet = MagnetUri::decode(&entry.magnet).map_err(NetError::from)?;
        let bytes = self.swarm.fetch(&magnet, Duration::from_secs(5)).await?;
        let (event, _) = EventCodec::decode(&bytes, false).map_err(NetError::from)?;
        wot.parse_contact_list(&event, degree);
        Ok(())
    }

    /// Expand the web-of-trust graph outward one degree at a time, up to
    /// `WoTGraph::max_degree`.
    pub async fn sync_wot_recursive(&self) -> NetResult<()> {
        let Some(wot) = self.wot.clone() else {
            return Ok(());
        };
        for degree in 1..wot.max_degree() {
            let pubkeys = wot.pubkeys_at(degree);
            let mut tasks = Vec::new();
            for relay_pubkey in pubkeys {
                tasks.push(async move {
                    if let Ok(Some(transport_pubkey)) =
                        self.resolve_transport_key(&relay_pubkey).await
                    {
                        let _ = self
                            .bootstrap_wot(&transport_pubkey, Some(&relay_pubkey), degree + 1)
                            .await;
                    }
                });
            }
            futures_util::future::join_all(tasks).await;
        }
        Ok(())
    }

    /// Discover and merge the feed entries of every followed pubkey,
    /// newest-first.
    pub async fn subscribe_follows_p2p(&self) -> NetResult<Vec<IndexEntry>> {
        let Some(wot) = &self.wot else {
            return Ok(Vec::new());
        };
        let mut merged: HashMap<String, IndexEntry> = HashMap::new();
        for relay_pubkey in wot.all_pubkeys() {
            let Ok(Some(transport_pubkey)) = self.resolve_transport_key(&relay_pubkey).await
            else {
                continue;
            };
            let entries = self
                .subscribe_p2p(&transport_pubkey, Some(&relay_pubkey))
                .await
                .unwrap_or_default();
            for entry in entries {
                merged.insert(entry.id.clone(), entry);
            }
        }
        let mut merged: Vec<IndexEntry> = merged.into_values().collect();
        merged.sort_by(|a, b| b.ts.cmp(&a.ts));
        Ok(merged)
    }

    /// Reseed `event` in the background if and only if its author is
    /// someone we follow.
    pub async fn handle_incoming_event(&self, event: Event) {
        let Some(wot) = &self.wot else { return };
        if !wot.contains(&event.pubkey) {
            return;
        }
        if let Err(err) = self.reseed_event(event, true).await {
            tracing::warn!(%err, "background reseed of followed event failed");
        }
    }

    /// Cancel pending subscriptions, drain the seeding queue, and clear
    /// caches. Mirrors a server's shutdown-broadcast sequence.
    pub async fn shutdown(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        for subscription in subscriptions.drain(..) {
            subscription.close();
        }
        if let Some(queue) = &self.seeding_queue {
            queue.close().await;
        }
        self.key_cache.lock().clear();
        self.magnet_cache.lock().clear();
    }

    /// Register a subscription with the coordinator so `shutdown` can
    /// cancel it later.
    pub async fn track_subscription(&self, subscription: bridge_net::relay::Subscription) {
        self.subscriptions.lock().await.push(subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::identity::IdentityStore;
    use bridge_net::dht::InMemoryDht;
    use bridge_net::relay::LoopbackRelayClient;
    use bridge_net::swarm::InMemorySwarmClient;

    fn coordinator() -> TransportCoordinator {
        let relay = Arc::new(LoopbackRelayClient::new());
        let swarm = Arc::new(InMemorySwarmClient::new());
        TransportCoordinator::new(relay, swarm, None, None, None, None)
    }

    fn signed_event(identity: &IdentityStore, content: &str) -> Event {
        let draft = Event {
            kind: 1,
            created_at: 1_700_000_000,
            content: content.to_string(),
            ..Default::default()
        };
        identity.sign_event(draft).unwrap()
    }

    #[tokio::test]
    async fn publish_seeds_after_relay_accepts() {
        let coordinator = coordinator();
        let identity = IdentityStore::generate();
        let event = signed_event(&identity, "hello");
        let outcome = coordinator.publish(event, vec![]).await.unwrap();
        assert!(!outcome.magnet.infohash_hex.is_empty());
    }

    #[tokio::test]
    async fn reseed_event_prefers_bt_tag_over_seeding() {
        let coordinator = coordinator();
        let identity = IdentityStore::generate();
        let mut event = signed_event(&identity, "hello");
        let tag_magnet = "magnet:?xt=urn:btih:".to_string() + &"a".repeat(40);
        event.tags.push(vec!["bt".to_string(), tag_magnet.clone()]);

        let outcome = coordinator.reseed_event(event, false).await.unwrap();
        match outcome {
            ReseedOutcome::Magnet(magnet) => assert_eq!(magnet.encode(), tag_magnet),
            ReseedOutcome::Queued(_) => panic!("expected immediate magnet"),
        }
    }

    #[tokio::test]
    async fn reseed_event_cache_hit_short_circuits() {
        let coordinator = coordinator();
        let identity = IdentityStore::generate();
        let event = signed_event(&identity, "hello");

        let first = coordinator.reseed_event(event.clone(), false).await.unwrap();
        let second = coordinator.reseed_event(event, false).await.unwrap();
        match (first, second) {
            (ReseedOutcome::Magnet(a), ReseedOutcome::Magnet(b)) => {
                assert_eq!(a.infohash_hex, b.infohash_hex);
            }
            _ => panic!("expected magnets"),
        }
    }

    #[tokio::test]
    async fn fetch_media_falls_back_when_bt_tag_absent() {
        let coordinator = coordinator();
        let identity = IdentityStore::generate();
        let mut event = signed_event(&identity, "hello");
        event.tags.push(vec!["url".to_string(), "not-a-real-host.invalid".to_string()]);
        let result = coordinator.fetch_media(&event).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn handle_incoming_event_noop_when_not_followed() {
        let coordinator = coordinator();
        let identity = IdentityStore::generate();
        let event = signed_event(&identity, "hello");
        coordinator.handle_incoming_event(event).await;
    }

    #[tokio::test]
    async fn shutdown_clears_caches() {
        let coordinator = coordinator();
        let identity = IdentityStore::generate();
        let event = signed_event(&identity, "hello");
        coordinator.reseed_event(event, false).await.unwrap();
        coordinator.shutdown().await;
        assert_eq!(coordinator.magnet_cache.lock().len(), 0);
    }
}
