//! FeedManager: owns a node's feed index and drives its DHT pointer
//! record (component design §4.4).

use bridge_core::canonical::{pointer_sign_bytes, pointer_value_bencode};
use bridge_core::crypto::dht_target;
use bridge_core::feed_index::FeedIndex;
use bridge_core::identity::IdentityStore;
use bridge_core::magnet::MagnetUri;
use bridge_core::types::{Event, PointerRecord, PointerValue, D_TAG_FEED, KIND_BRIDGE};
use bridge_net::dht::DhtClient;
use bridge_net::swarm::{SeedRequest, SwarmClient};
use bridge_net::{Error as NetError, Result as NetResult};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

struct State {
    index: FeedIndex,
    seq: u64,
}

/// Result of [`FeedManager::update_feed`] when a bridge-discovery event is
/// also requested.
pub struct FeedUpdate {
    pub magnet: MagnetUri,
    pub bridge_event: Option<Event>,
}

/// Drives one node's feed index and its DHT-published pointer record.
/// `update_feed` calls are serialized through an internal mutex so a
/// node's `seq` never races itself.
pub struct FeedManager {
    identity: Arc<IdentityStore>,
    swarm: Arc<dyn SwarmClient>,
    dht: Arc<dyn DhtClient>,
    state: Mutex<State>,
}

impl FeedManager {
    pub fn new(
        identity: Arc<IdentityStore>,
        swarm: Arc<dyn SwarmClient>,
        dht: Arc<dyn DhtClient>,
        index_limit: usize,
    ) -> Self {
        Self {
            identity,
            swarm,
            dht,
            state: Mutex::new(State {
                index: FeedIndex::new(index_limit),
                seq: 1,
            }),
        }
    }

    /// This node's swarm (Ed25519) public key, hex-encoded — the
    /// `transport_pubkey` other nodes resolve pointers by.
    pub fn swarm_public_key_hex(&self) -> String {
        self.identity.swarm_public_key_hex()
    }

    /// Resolve the current remote `seq` for this node's pointer and adopt
    /// `remote_seq + 1` so subsequent PUTs don't stall on a stale sequence.
    /// Absence or a transport error leaves `seq` unchanged.
    pub async fn sync_sequence(&self) -> u64 {
        let pubkey_hex = match self.identity.public_key_hex() {
            Ok(pk) => pk,
            Err(_) => return self.state.lock().await.seq,
        };
        if let Ok(Some(resolved)) = self.resolve_feed_pointer(&pubkey_hex).await {
            let mut state = self.state.lock().await;
            state.seq = resolved.seq + 1;
        }
        self.state.lock().await.seq
    }

    /// Add `event` to the feed index, seed the updated index, and publish
    /// its pointer. Optionally builds (but does not sign) a bridge
    /// discovery event via `sign_bridge`.
    pub async fn update_feed(
        &self,
        event: &Event,
        magnet: impl Into<String>,
        sign_bridge: Option<&dyn Fn(Event) -> NetResult<Event>>,
    ) -> NetResult<FeedUpdate> {
        let index_bytes = {
            let mut state = self.state.lock().await;
            state.index.add(event, magnet);
            state.index.to_bytes()
        };

        let index_magnet = self
            .swarm
            .seed(SeedRequest {
                buffer: index_bytes,
                filename: "index.json".to_string(),
            })
            .await?;

        let infohash = index_magnet.infohash().map_err(NetError::from)?;
        self.publish_feed_pointer(infohash, 3).await?;

        let bridge_event = match sign_bridge {
            Some(sign) if !index_magnet.trackers.is_empty() => {
                let draft = Event {
                    kind: KIND_BRIDGE,
                    created_at: now_unix(),
                    tags: vec![vec!["d".to_string(), D_TAG_FEED.to_string()]],
                    content: index_magnet.encode(),
                    ..Default::default()
                };
                Some(sign(draft)?)
            }
            _ => None,
        };

        Ok(FeedUpdate {
            magnet: index_magnet,
            bridge_event,
        })
    }

    /// Build and PUT this node's pointer record, retrying up to `retries`
    /// times. The first attempt uses the node's current `seq` (1 on a
    /// node's very first publish); `seq` is only bumped after a failed
    /// attempt, so a DHT that saw a prior attempt never rejects a retry as
    /// stale. The stored `seq` advances past whatever value was actually
    /// PUT once the record lands.
    pub async fn publish_feed_pointer(&self, infohash: [u8; 20], retries: u32) -> NetResult<String> {
        let pubkey = self.identity.swarm_public_key();
        let pubkey_hex = hex::encode(pubkey);

        let mut seq = self.state.lock().await.seq;

        for attempt in 0..=retries {
            let value = PointerValue {
                ih: infohash,
                ts: now_unix(),
                npk: None,
            };
            let v_bencoded = pointer_value_bencode(&value).map_err(NetError::from)?;
            let sign_bytes = pointer_sign_bytes(seq, &v_bencoded);
            let sig = self.identity.sign(&sign_bytes);
            let record = PointerRecord {
                k: pubkey,
                seq,
                v: value,
                sig,
            };
            match self.dht.put(record).await {
                Ok(()) => {
                    self.state.lock().await.seq = seq + 1;
                    return Ok(pubkey_hex);
                }
                Err(err) if attempt < retries => {
                    tracing::warn!(attempt, %err, "DHT PUT failed, retrying");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    seq += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Err(NetError::core("DHT PUT exhausted retries"))
    }

    /// Resolve a node's pointer record by its swarm pubkey.
    pub async fn resolve_feed_pointer(
        &self,
        pubkey_hex: &str,
    ) -> NetResult<Option<ResolvedFeedPointer>> {
        let pubkey_bytes = hex::decode(pubkey_hex).map_err(|e| {
            NetError::core(format!("invalid pubkey hex: {e}"))
        })?;
        let pubkey: [u8; 32] = pubkey_bytes
            .try_into()
            .map_err(|_| NetError::core("pubkey must be 32 bytes"))?;
        let target = dht_target(&pubkey);
        let Some(record) = self.dht.get(target).await? else {
            return Ok(None);
        };
        Ok(Some(ResolvedFeedPointer {
            infohash: record.v.ih,
            ts: record.v.ts,
            seq: record.seq,
            npk: record.v.npk,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFeedPointer {
    pub infohash: [u8; 20],
    pub ts: u64,
    pub seq: u64,
    pub npk: Option<[u8; 32]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_net::dht::InMemoryDht;
    use bridge_net::swarm::InMemorySwarmClient;

    fn manager() -> FeedManager {
        let identity = Arc::new(IdentityStore::generate());
        let swarm = Arc::new(InMemorySwarmClient::new());
        let dht = Arc::new(InMemoryDht::new());
        FeedManager::new(identity, swarm, dht, 100)
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            created_at: 1_700_000_000,
            kind: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn update_feed_publishes_a_resolvable_pointer() {
        let manager = manager();
        let update = manager
            .update_feed(&event("e1"), "magnet:?xt=urn:btih:1", None)
            .await
            .unwrap();
        assert!(update.bridge_event.is_none());

        let pubkey_hex = manager.swarm_public_key_hex();
        let resolved = manager.resolve_feed_pointer(&pubkey_hex).await.unwrap();
        assert_eq!(resolved.unwrap().infohash, update.magnet.infohash().unwrap());
    }

    #[tokio::test]
    async fn successive_pointer_puts_strictly_increase_seq() {
        let manager = manager();
        manager
            .update_feed(&event("e1"), "m1", None)
            .await
            .unwrap();
        let seq_after_first = manager.state.lock().await.seq;
        manager
            .update_feed(&event("e2"), "m2", None)
            .await
            .unwrap();
        let seq_after_second = manager.state.lock().await.seq;
        assert!(seq_after_second > seq_after_first);
    }

    #[tokio::test]
    async fn resolve_unknown_pubkey_returns_none() {
        let manager = manager();
        let resolved = manager
            .resolve_feed_pointer(&"ab".repeat(32))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn sync_sequence_adopts_remote_seq_plus_one() {
        let manager = manager();
        manager
            .update_feed(&event("e1"), "m1", None)
            .await
            .unwrap();
        let pubkey_hex = manager.swarm_public_key_hex();
        let published_seq = manager
            .resolve_feed_pointer(&pubkey_hex)
            .await
            .unwrap()
            .unwrap()
            .seq;
        manager.state.lock().await.seq = 0;
        let synced = manager.sync_sequence().await;
        assert_eq!(synced, published_seq + 1);
    }

    #[tokio::test]
    async fn first_publish_uses_seq_one() {
        let manager = manager();
        manager
            .update_feed(&event("e1"), "m1", None)
            .await
            .unwrap();
        let pubkey_hex = manager.swarm_public_key_hex();
        let resolved = manager.resolve_feed_pointer(&pubkey_hex).await.unwrap().unwrap();
        assert_eq!(resolved.seq, 1);
    }
}
