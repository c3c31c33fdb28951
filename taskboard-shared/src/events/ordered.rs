/// Per-task event ordering
///
/// Two writes to the same task commit in version order, but the tasks that
/// made them race each other to the publisher. [`OrderedPublisher`] remembers
/// the last version it forwarded for every task and drops anything at or
/// below it, so subscribers never see a task go backwards:
///
/// - `TaskCreated` / `TaskUpdated` pass only with a higher version
/// - `TaskDeleted` always passes and closes the task for good
/// - `NewActionLogged` is not sequenced
///
/// A dropped event was superseded by one already delivered, which carries
/// the full record.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BoardEvent, PublishError, Publisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Published {
    Version(i64),
    Deleted,
}

/// Wraps a [`Publisher`] and keeps task events monotonic per task
pub struct OrderedPublisher {
    inner: Arc<dyn Publisher>,
    published: Mutex<HashMap<Uuid, Published>>,
}

impl OrderedPublisher {
    pub fn new(inner: Arc<dyn Publisher>) -> Self {
        Self {
            inner,
            published: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Publisher for OrderedPublisher {
    async fn publish(&self, event: BoardEvent) -> Result<(), PublishError> {
        let next = match &event {
            BoardEvent::TaskCreated(task) | BoardEvent::TaskUpdated(task) => {
                (task.id, Published::Version(task.version))
            }
            BoardEvent::TaskDeleted(id) => (*id, Published::Deleted),
            BoardEvent::NewActionLogged(_) => return self.inner.publish(event).await,
        };

        // Held across the send so the check and the delivery stay in one order
        let mut published = self.published.lock().await;
        let (task_id, state) = next;

        if let (Some(last), Published::Version(version)) = (published.get(&task_id), state) {
            let superseded = match last {
                Published::Deleted => true,
                Published::Version(last) => version <= *last,
            };
            if superseded {
                tracing::debug!(
                    task_id = %task_id,
                    version,
                    event = event.name(),
                    "Dropping superseded task event"
                );
                return Ok(());
            }
        }

        published.insert(task_id, state);
        self.inner.publish(event).await
    }
}
