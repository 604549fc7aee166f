//! SwarmClient: content-addressed seed/fetch against the swarm network
//! (component design §4.5).

use crate::error::{Error, Result};
use async_trait::async_trait;
use bridge_core::magnet::MagnetUri;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A buffer to be seeded, plus the name it is seeded under.
pub struct SeedRequest {
    pub buffer: Vec<u8>,
    pub filename: String,
}

/// Contract implemented by real swarm backends and the in-memory test
/// double alike.
#[async_trait]
pub trait SwarmClient: Send + Sync {
    /// Seed `request.buffer` under `request.filename`; idempotent for
    /// identical buffer+filename pairs.
    async fn seed(&self, request: SeedRequest) -> Result<MagnetUri>;

    /// Join the swarm for `magnet` and download its first file, failing
    /// with `Timeout` if `deadline` elapses first.
    async fn fetch(&self, magnet: &MagnetUri, deadline: Duration) -> Result<Vec<u8>>;

    /// Resolve when the DHT has at least one known node.
    async fn wait_for_dht(&self, deadline: Duration) -> Result<()>;

    /// Register a tracker URL for all current and future seeds.
    async fn announce_tracker(&self, url: String);
}

/// In-memory reference `SwarmClient`: hashes buffers with SHA-1 for the
/// infohash and stores them in a map, standing in for a real swarm stack in
/// tests.
#[derive(Clone)]
pub struct InMemorySwarmClient {
    objects: Arc<Mutex<HashMap<[u8; 20], Vec<u8>>>>,
    trackers: Arc<Mutex<Vec<String>>>,
    dht_nodes: Arc<Mutex<usize>>,
}

impl Default for InMemorySwarmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySwarmClient {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            trackers: Arc::new(Mutex::new(Vec::new())),
            dht_nodes: Arc::new(Mutex::new(1)),
        }
    }

    /// Construct a client whose DHT never becomes ready, for testing the
    /// `wait_for_dht` timeout path.
    pub fn without_dht() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            trackers: Arc::new(Mutex::new(Vec::new())),
            dht_nodes: Arc::new(Mutex::new(0)),
        }
    }

    fn infohash_of(buffer: &[u8]) -> [u8; 20] {
        Sha1::digest(buffer).into()
    }
}

#[async_trait]
impl SwarmClient for InMemorySwarmClient {
    async fn seed(&self, request: SeedRequest) -> Result<MagnetUri> {
        let infohash = Self::infohash_of(&request.buffer);
        self.objects
            .lock()
            .await
            .insert(infohash, request.buffer);
        let mut magnet = MagnetUri::new(&infohash, request.filename);
        magnet.union_trackers(self.trackers.lock().await.iter().cloned());
        Ok(magnet)
    }

    async fn fetch(&self, magnet: &MagnetUri, deadline: Duration) -> Result<Vec<u8>> {
        let infohash = magnet.infohash().map_err(Error::from)?;
        let objects = self.objects.clone();
        let result = tokio::time::timeout(deadline, async move {
            objects.lock().await.get(&infohash).cloned()
        })
        .await
        .map_err(|_| Error::Timeout {
            deadline_ms: deadline.as_millis() as u64,
        })?;
        result.ok_or_else(|| Error::bt("no peers resolved the requested infohash"))
    }

    async fn wait_for_dht(&self, deadline: Duration) -> Result<()> {
        let nodes = self.dht_nodes.clone();
        tokio::time::timeout(deadline, async move {
            loop {
                if *nodes.lock().await > 0 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| Error::Timeout {
            deadline_ms: deadline.as_millis() as u64,
        })
    }

    async fn announce_tracker(&self, url: String) {
        let mut trackers = self.trackers.lock().await;
        if !trackers.contains(&url) {
            trackers.push(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_is_idempotent_for_identical_buffers() {
        let client = InMemorySwarmClient::new();
        let m1 = client
            .seed(SeedRequest {
                buffer: b"hello".to_vec(),
                filename: "a.json".to_string(),
            })
            .await
            .unwrap();
        let m2 = client
            .seed(SeedRequest {
                buffer: b"hello".to_vec(),
                filename: "a.json".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(m1.infohash_hex, m2.infohash_hex);
    }

    #[tokio::test]
    async fn fetch_round_trips_seeded_buffer() {
        let client = InMemorySwarmClient::new();
        let magnet = client
            .seed(SeedRequest {
                buffer: b"payload".to_vec(),
                filename: "f.bin".to_string(),
            })
            .await
            .unwrap();
        let fetched = client.fetch(&magnet, Duration::from_secs(1)).await.unwrap();
        assert_eq!(fetched, b"payload");
    }

    #[tokio::test]
    async fn fetch_unknown_magnet_times_out_or_fails() {
        let client = InMemorySwarmClient::new();
        let magnet = MagnetUri::new(&[0xff; 20], "missing");
        let err = client
            .fetch(&magnet, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { kind: "bt", .. }));
    }

    #[tokio::test]
    async fn wait_for_dht_times_out_without_nodes() {
        let client = InMemorySwarmClient::without_dht();
        let err = client.wait_for_dht(Duration::from_millis(30)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn announce_tracker_is_applied_to_subsequent_seeds() {
        let client = InMemorySwarmClient::new();
        client.announce_tracker("udp://tracker.example:80".to_string()).await;
        let magnet = client
            .seed(SeedRequest {
                buffer: b"x".to_vec(),
                filename: "x.bin".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(magnet.trackers, vec!["udp://tracker.example:80".to_string()]);
    }
}
