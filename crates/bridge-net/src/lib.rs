//! bridge-net
//!
//! Async transport contracts and concrete clients bridging the
//! relay-network and swarm-network sides of the system:
//!
//! - [`relay`]: `RelayClient` trait, `LoopbackRelayClient`, `WebSocketRelayClient`
//! - [`swarm`]: `SwarmClient` trait, `InMemorySwarmClient`
//! - [`dht`]: `DhtClient` trait, `InMemoryDht`, BEP-44 pointer record PUT/GET
//! - [`seeding_queue`]: bounded-concurrency background seeding worker pool
//! - [`error`]: error types shared across the above

pub mod dht;
pub mod error;
pub mod relay;
pub mod seeding_queue;
pub mod swarm;

pub use dht::DhtClient;
pub use error::{Error, Result};
pub use relay::{Filter, RelayClient, Subscription};
pub use seeding_queue::SeedingQueue;
pub use swarm::{SeedRequest, SwarmClient};
