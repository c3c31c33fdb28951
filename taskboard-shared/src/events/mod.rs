/// Board events and the publish capability
///
/// Every accepted mutation is announced to all connected sessions,
/// the session that made the change included. The board core only knows the
/// [`Publisher`] trait; which transport carries the events (an in-process
/// [`BroadcastHub`], Redis fan-out across instances) is decided when the
/// service is constructed.
///
/// Task events for one task are published in version order; see
/// [`OrderedPublisher`].
///
/// # Wire format
///
/// Events are adjacently tagged JSON:
///
/// ```json
/// {"type": "taskUpdated", "data": {"id": "...", "version": 3, ...}}
/// {"type": "taskDeleted", "data": "3f1c..."}
/// ```

pub mod hub;
pub mod ordered;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ActionLogDetails, Task};

pub use hub::BroadcastHub;
pub use ordered::OrderedPublisher;

/// A state change pushed to every connected session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BoardEvent {
    /// A task was created (full record, version 0)
    TaskCreated(Task),

    /// A task was mutated (full record after the update)
    TaskUpdated(Task),

    /// A task was removed (identity only)
    TaskDeleted(Uuid),

    /// An activity entry was recorded
    NewActionLogged(ActionLogDetails),
}

impl BoardEvent {
    /// Event name, as used for the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::TaskCreated(_) => "taskCreated",
            BoardEvent::TaskUpdated(_) => "taskUpdated",
            BoardEvent::TaskDeleted(_) => "taskDeleted",
            BoardEvent::NewActionLogged(_) => "newActionLogged",
        }
    }

    /// Task the event concerns, if any
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            BoardEvent::TaskCreated(task) | BoardEvent::TaskUpdated(task) => Some(task.id),
            BoardEvent::TaskDeleted(id) => Some(*id),
            BoardEvent::NewActionLogged(details) => details.entry.task_id,
        }
    }
}

/// Error type for event publication
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to publish event: {0}")]
    Transport(String),
}

/// Capability to fan an event out to connected sessions
///
/// Delivery is best-effort: a publish that reaches nobody is not an error.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, event: BoardEvent) -> Result<(), PublishError>;
}
