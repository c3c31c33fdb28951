/// Cross-instance event fan-out over Redis pub/sub
///
/// When several API instances serve the same board, each one publishes its
/// events to the `taskboard:events` channel and relays events published by
/// the others into its local [`BroadcastHub`]. Each message is wrapped in an
/// envelope naming the instance that produced it, so an instance never
/// re-delivers its own events.
///
/// ```text
/// instance A ── publish ──▶ hub A ──▶ A's sessions
///      │
///      └─ PUBLISH taskboard:events ──▶ relay on B ──▶ hub B ──▶ B's sessions
/// ```

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::client::{RedisClient, RedisClientError};
use crate::events::{BoardEvent, BroadcastHub, PublishError, Publisher};

/// Pub/sub channel shared by all instances
pub const EVENTS_CHANNEL: &str = "taskboard:events";

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    origin: Uuid,
    event: BoardEvent,
}

/// Publishes locally first, then to Redis for the other instances
#[derive(Clone)]
pub struct RedisPublisher {
    redis: RedisClient,
    local: BroadcastHub,
    origin: Uuid,
}

impl RedisPublisher {
    pub fn new(redis: RedisClient, local: BroadcastHub) -> Self {
        Self {
            redis,
            local,
            origin: Uuid::new_v4(),
        }
    }

    /// ID this instance stamps on outgoing envelopes
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Starts relaying other instances' events into the local hub
    pub fn spawn_relay(&self) -> JoinHandle<()> {
        let redis = self.redis.clone();
        let hub = self.local.clone();
        let origin = self.origin;

        tokio::spawn(async move {
            loop {
                if let Err(e) = relay_loop(&redis, &hub, origin).await {
                    tracing::error!(error = %e, "Redis event relay failed, reconnecting");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, event: BoardEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&Envelope {
            origin: self.origin,
            event: event.clone(),
        })?;

        self.local.send(event);

        let mut conn = self.redis.connection();
        let _: i64 = conn
            .publish(EVENTS_CHANNEL, payload)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Subscribes and forwards foreign events until the connection drops
async fn relay_loop(
    redis: &RedisClient,
    hub: &BroadcastHub,
    origin: Uuid,
) -> Result<(), RedisClientError> {
    let conn = redis.client().get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.subscribe(EVENTS_CHANNEL).await?;

    tracing::info!(channel = EVENTS_CHANNEL, %origin, "Relaying board events from Redis");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read pub/sub payload");
                continue;
            }
        };

        match decode_foreign(&payload, origin) {
            Ok(Some(event)) => hub.send(event),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Dropping malformed board event"),
        }
    }

    Err(RedisClientError::ConnectionError(
        "pub/sub stream ended".to_string(),
    ))
}

/// Decodes an envelope, returning `None` for events this instance published
fn decode_foreign(payload: &str, origin: Uuid) -> Result<Option<BoardEvent>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(payload)?;
    if envelope.origin == origin {
        return Ok(None);
    }
    Ok(Some(envelope.event))
}
