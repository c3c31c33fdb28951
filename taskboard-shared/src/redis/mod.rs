/// Redis integration
///
/// Optional: only used when `REDIS_URL` is configured, to fan board events
/// out across several API instances.
///
/// - `client`: Connection management and health checks
/// - `fanout`: Pub/sub publisher and relay for [`crate::events::BoardEvent`]s

pub mod client;
pub mod fanout;

pub use client::{RedisClient, RedisClientError, RedisConfig};
pub use fanout::{RedisPublisher, EVENTS_CHANNEL};
