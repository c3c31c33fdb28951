/// In-process broadcast hub
///
/// Wraps a tokio `broadcast` channel. Each connected session holds a
/// receiver; publishing clones the event to all of them. A receiver that
/// falls more than `capacity` events behind loses the oldest ones and sees
/// `RecvError::Lagged`; clients recover by re-fetching the board.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{BoardEvent, PublishError, Publisher};

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 256;

/// Fans events out to every subscriber in this process
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<BoardEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new session
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }

    /// Number of sessions currently subscribed
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends without going through the [`Publisher`] trait
    pub fn send(&self, event: BoardEvent) {
        let name = event.name();
        if let Err(error) = self.sender.send(event) {
            tracing::debug!(?error, event = name, "no subscribers for board event");
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Publisher for BroadcastHub {
    async fn publish(&self, event: BoardEvent) -> Result<(), PublishError> {
        self.send(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let hub = BroadcastHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        let id = Uuid::new_v4();
        hub.publish(BoardEvent::TaskDeleted(id)).await.unwrap();

        assert_eq!(a.recv().await.unwrap(), BoardEvent::TaskDeleted(id));
        assert_eq!(b.recv().await.unwrap(), BoardEvent::TaskDeleted(id));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let hub = BroadcastHub::new(8);
        assert!(hub.publish(BoardEvent::TaskDeleted(Uuid::new_v4())).await.is_ok());
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backlog() {
        let hub = BroadcastHub::new(8);
        let _early = hub.subscribe();
        hub.send(BoardEvent::TaskDeleted(Uuid::new_v4()));

        let mut late = hub.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let hub = BroadcastHub::new(2);
        let mut slow = hub.subscribe();
        for _ in 0..5 {
            hub.send(BoardEvent::TaskDeleted(Uuid::new_v4()));
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
    }
}
