//! DHT pointer client: BEP-44-style signed mutable records
//! (component design §4.4, external interfaces §6).

use crate::error::{Error, Result};
use async_trait::async_trait;
use bridge_core::canonical::{pointer_sign_bytes, pointer_value_bencode, pointer_value_from_bencode};
use bridge_core::crypto::{dht_target, ed25519_verify};
use bridge_core::types::{PointerRecord, PointerValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Contract for BEP-44 PUT/GET against a DHT, real or in-memory.
#[async_trait]
pub trait DhtClient: Send + Sync {
    async fn put(&self, record: PointerRecord) -> Result<()>;
    async fn get(&self, target: [u8; 20]) -> Result<Option<PointerRecord>>;
}

/// In-memory DHT double keyed by target address, rejecting PUTs whose
/// signature doesn't verify or whose `seq` doesn't advance — the same
/// anti-rollback rule a real DHT node enforces.
#[derive(Clone)]
pub struct InMemoryDht {
    records: Arc<Mutex<HashMap<[u8; 20], PointerRecord>>>,
}

impl Default for InMemoryDht {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDht {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl DhtClient for InMemoryDht {
    async fn put(&self, record: PointerRecord) -> Result<()> {
        let v_bencoded = pointer_value_bencode(&record.v).map_err(Error::from)?;
        let sign_bytes = pointer_sign_bytes(record.seq, &v_bencoded);
        ed25519_verify(&record.k, &sign_bytes, &record.sig).map_err(Error::from)?;

        let target = dht_target(&record.k);
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(&target) {
            if record.seq <= existing.seq {
                return Err(Error::core("stale sequence number rejected"));
            }
        }
        records.insert(target, record);
        Ok(())
    }

    async fn get(&self, target: [u8; 20]) -> Result<Option<PointerRecord>> {
        Ok(self.records.lock().await.get(&target).cloned())
    }
}

/// Decode a pointer record's `v` dictionary into its component fields,
/// as returned by a successful GET.
pub fn decode_pointer_value(bytes: &[u8]) -> Result<PointerValue> {
    pointer_value_from_bencode(bytes).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::crypto::{ed25519_public_key, ed25519_sign};

    fn signed_record(seed: [u8; 32], seq: u64, ih: [u8; 20]) -> PointerRecord {
        let k = ed25519_public_key(&seed);
        let v = PointerValue { ih, ts: 1_700_000_000, npk: None };
        let v_bencoded = pointer_value_bencode(&v).unwrap();
        let sign_bytes = pointer_sign_bytes(seq, &v_bencoded);
        let sig = ed25519_sign(&seed, &sign_bytes);
        PointerRecord { k, seq, v, sig }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dht = InMemoryDht::new();
        let seed = [1u8; 32];
        let record = signed_record(seed, 1, [7u8; 20]);
        let target = dht_target(&record.k);
        dht.put(record.clone()).await.unwrap();
        let fetched = dht.get(target).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn put_rejects_stale_sequence() {
        let dht = InMemoryDht::new();
        let seed = [2u8; 32];
        dht.put(signed_record(seed, 5, [1u8; 20])).await.unwrap();
        let err = dht.put(signed_record(seed, 3, [2u8; 20])).await.unwrap_err();
        assert!(matches!(err, Error::Transport { kind: "core", .. }));
    }

    #[tokio::test]
    async fn put_rejects_invalid_signature() {
        let dht = InMemoryDht::new();
        let mut record = signed_record([3u8; 32], 1, [9u8; 20]);
        record.sig[0] ^= 0xff;
        assert!(dht.put(record).await.is_err());
    }

    #[tokio::test]
    async fn get_on_unknown_target_returns_none() {
        let dht = InMemoryDht::new();
        assert!(dht.get([0u8; 20]).await.unwrap().is_none());
    }
}
