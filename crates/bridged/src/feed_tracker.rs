//! FeedTracker: DHT-then-relay discovery of a remote node's feed magnet
//! (component design §4.7).

use crate::feed_manager::FeedManager;
use bridge_core::magnet::MagnetUri;
use bridge_core::types::{D_TAG_FEED, KIND_BRIDGE};
use bridge_net::relay::{Filter, RelayClient};
use bridge_net::Result as NetResult;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

const RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves a `transport_pubkey` to its current feed magnet, trying the
/// DHT first and falling back to a relay subscription. Break the
/// `TransportCoordinator` ↔ `FeedTracker` cycle by constructing this with
/// explicit handles rather than a back-reference to the coordinator.
pub struct FeedTracker {
    feed_manager: Arc<FeedManager>,
    relay: Arc<dyn RelayClient>,
    trackers: Vec<String>,
    cache: Mutex<LruCache<String, MagnetUri>>,
}

impl FeedTracker {
    pub fn new(
        feed_manager: Arc<FeedManager>,
        relay: Arc<dyn RelayClient>,
        trackers: Vec<String>,
        cache_size: usize,
    ) -> Self {
        Self {
            feed_manager,
            relay,
            trackers,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_size.max(1)).unwrap(),
            )),
        }
    }

    /// Discover the current feed magnet for `transport_pubkey`.
    pub async fn discover(
        &self,
        transport_pubkey: &str,
        relay_pubkey: Option<&str>,
    ) -> NetResult<Option<MagnetUri>> {
        if let Some(cached) = self.cache.lock().get(transport_pubkey) {
            return Ok(Some(cached.clone()));
        }

        let mut magnet = match self.feed_manager.resolve_feed_pointer(transport_pubkey).await? {
            Some(resolved) => Some(MagnetUri::new(&resolved.infohash, "index.json")),
            None => None,
        };

        if magnet.is_none() {
            if let Some(relay_pubkey) = relay_pubkey {
                let filter = Filter::new()
                    .authors(vec![relay_pubkey.to_string()])
                    .kinds(vec![KIND_BRIDGE])
                    .tag("d", vec![D_TAG_FEED.to_string()])
                    .limit(1);
                let event = self
                    .relay
                    .await_event(
                        filter,
                        RELAY_TIMEOUT,
                        Box::new(|event| event.content.starts_with("magnet:")),
                    )
                    .await?;
                magnet = event.and_then(|event| MagnetUri::decode(&event.content).ok());
            }
        }

        if let Some(magnet) = &mut magnet {
            magnet.union_trackers(self.trackers.iter().cloned());
            self.cache
                .lock()
                .put(transport_pubkey.to_string(), magnet.clone());
        }

        Ok(magnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::identity::IdentityStore;
    use bridge_core::types::Event;
    use bridge_net::dht::InMemoryDht;
    use bridge_net::relay::LoopbackRelayClient;
    use bridge_net::swarm::InMemorySwarmClient;

    fn tracker() -> (FeedTracker, Arc<FeedManager>, LoopbackRelayClient) {
        let identity = Arc::new(IdentityStore::generate());
        let swarm = Arc::new(InMemorySwarmClient::new());
        let dht = Arc::new(InMemoryDht::new());
        let feed_manager = Arc::new(FeedManager::new(identity, swarm, dht, 100));
        let relay = LoopbackRelayClient::new();
        let tracker = FeedTracker::new(
            feed_manager.clone(),
            Arc::new(relay.clone()),
            vec!["udp://tracker.example:80".to_string()],
            16,
        );
        (tracker, feed_manager, relay)
    }

    #[tokio::test]
    async fn discover_finds_pointer_published_via_dht() {
        let (tracker, feed_manager, _relay) = tracker();
        let event = Event {
            id: "e1".to_string(),
            created_at: 1_700_000_000,
            kind: 1,
            ..Default::default()
        };
        feed_manager.update_feed(&event, "m1", None).await.unwrap();
        let transport_pubkey = feed_manager.swarm_public_key_hex();

        let magnet = tracker.discover(&transport_pubkey, None).await.unwrap();
        assert!(magnet.is_some());
        assert!(magnet.unwrap().trackers.contains(&"udp://tracker.example:80".to_string()));
    }

    #[tokio::test]
    async fn discover_returns_none_when_nothing_found() {
        let (tracker, _fm, _relay) = tracker();
        let result = tracker.discover(&"ab".repeat(32), None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn discover_caches_result_across_calls() {
        let (tracker, feed_manager, _relay) = tracker();
        let event = Event {
            id: "e1".to_string(),
            created_at: 1_700_000_000,
            kind: 1,
            ..Default::default()
        };
        feed_manager.update_feed(&event, "m1", None).await.unwrap();
        let transport_pubkey = feed_manager.swarm_public_key_hex();

        let first = tracker.discover(&transport_pubkey, None).await.unwrap();
        let second = tracker.discover(&transport_pubkey, None).await.unwrap();
        assert_eq!(first, second);
    }
}
