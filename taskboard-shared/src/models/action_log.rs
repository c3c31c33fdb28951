/// Action log model
///
/// The action log is the board's append-only audit trail. Entries are never
/// updated or deleted. `task_id` is a weak reference: once the task is
/// deleted it dangles (or is `None` for the deletion entry itself), which is
/// why the title is copied into every entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::UserSummary;

/// Number of entries returned by the activity feed
pub const RECENT_ACTIVITY_LIMIT: usize = 20;

/// Kind of mutation an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Created,
    Updated,
    Deleted,
    Assigned,
    StatusChange,
    PriorityChange,
    DragDrop,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Created => "created",
            ActionKind::Updated => "updated",
            ActionKind::Deleted => "deleted",
            ActionKind::Assigned => "assigned",
            ActionKind::StatusChange => "status_change",
            ActionKind::PriorityChange => "priority_change",
            ActionKind::DragDrop => "drag_drop",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActionKind::Created),
            "updated" => Ok(ActionKind::Updated),
            "deleted" => Ok(ActionKind::Deleted),
            "assigned" => Ok(ActionKind::Assigned),
            "status_change" => Ok(ActionKind::StatusChange),
            "priority_change" => Ok(ActionKind::PriorityChange),
            "drag_drop" => Ok(ActionKind::DragDrop),
            other => Err(format!("unknown action kind: {}", other)),
        }
    }
}

/// A recorded action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// User who performed the action
    pub user_id: Uuid,

    /// What happened
    pub action: ActionKind,

    /// Task the action touched; may dangle after deletion
    pub task_id: Option<Uuid>,

    /// Title of the task at the time of the action
    pub task_title: String,

    /// Human-readable description
    pub description: String,

    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

/// An entry with the acting user resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogDetails {
    #[serde(flatten)]
    pub entry: ActionLogEntry,

    /// `None` if the acting user no longer exists
    pub user: Option<UserSummary>,
}

/// Input for appending an entry
#[derive(Debug, Clone)]
pub struct NewActionLogEntry {
    pub user_id: Uuid,
    pub action: ActionKind,
    pub task_id: Option<Uuid>,
    pub task_title: String,
    pub description: String,
}
