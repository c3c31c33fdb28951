/// Task model
///
/// A task is a card on the board. It lives in exactly one status column and
/// carries a version counter that is the basis of the optimistic-concurrency
/// protocol: every accepted mutation moves `version` from `n` to `n + 1`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     title TEXT NOT NULL,
///     description TEXT,
///     status TEXT NOT NULL DEFAULT 'Todo',
///     priority TEXT NOT NULL DEFAULT 'Medium',
///     creator_id UUID NOT NULL REFERENCES users(id),
///     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     version BIGINT NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (creator_id, title)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::UserSummary;

/// Display names of the board columns, in board order.
///
/// These names are reserved and may not be used as task titles.
pub const COLUMN_NAMES: [&str; 3] = ["Todo", "In Progress", "Done"];

/// Board column a task sits in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started
    #[default]
    Todo,

    /// Being worked on
    #[serde(rename = "In Progress")]
    InProgress,

    /// Finished; no longer counts toward a user's load
    Done,
}

impl TaskStatus {
    /// All statuses in column order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// Column name used for storage and display
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    /// Active tasks (Todo, In Progress) count toward smart-assignment load
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Todo | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Todo" => Ok(TaskStatus::Todo),
            "In Progress" => Ok(TaskStatus::InProgress),
            "Done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(TaskPriority::Low),
            "Medium" => Ok(TaskPriority::Medium),
            "High" => Ok(TaskPriority::High),
            other => Err(format!("unknown task priority: {}", other)),
        }
    }
}

/// A task card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Title, unique among the creator's tasks
    pub title: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// Column the task sits in
    pub status: TaskStatus,

    /// Priority
    pub priority: TaskPriority,

    /// User who created the task (only they may delete it)
    pub creator_id: Uuid,

    /// Current assignee, if any
    pub assignee_id: Option<Uuid>,

    /// Optimistic-concurrency version; 0 at creation, +1 per accepted mutation
    pub version: i64,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last mutated
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether `user_id` may update this task (creator or current assignee)
    pub fn is_editable_by(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.assignee_id == Some(user_id)
    }

    /// Whether `user_id` can see this task in their board
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.is_editable_by(user_id)
    }

    /// Whether `user_id` carries this task as active load
    pub fn counts_toward(&self, user_id: Uuid) -> bool {
        self.status.is_active() && self.is_editable_by(user_id)
    }
}

/// A task with its creator and assignee resolved to user summaries
///
/// Either summary is `None` when the referenced user no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,

    pub creator: Option<UserSummary>,

    pub assignee: Option<UserSummary>,
}

/// Input for inserting a new task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub creator_id: Uuid,
    pub assignee_id: Option<Uuid>,
}

/// A partial set of field changes applied by a conditional update
///
/// Every field is optional; absent fields are left untouched. `description`
/// and `assignee_id` distinguish "absent" (`None`) from "clear the field"
/// (`Some(None)`), so a JSON `null` unassigns while a missing key keeps the
/// current assignee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee_id: Option<Option<Uuid>>,
}

impl TaskChanges {
    /// Changes that only move the task to another column
    pub fn move_to(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Changes that only reassign the task
    pub fn assign(assignee_id: Option<Uuid>) -> Self {
        Self {
            assignee_id: Some(assignee_id),
            ..Default::default()
        }
    }

    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee_id.is_none()
    }

    /// Writes the changed fields into `task`
    ///
    /// Version and timestamps are left alone; only storage advances them.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
    }
}

/// Keeps an explicit JSON `null` distinguishable from a missing field
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "Write release notes".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            creator_id: Uuid::new_v4(),
            assignee_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_names_match_columns() {
        let names: Vec<&str> = TaskStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, COLUMN_NAMES);
        for name in COLUMN_NAMES {
            assert_eq!(name.parse::<TaskStatus>().unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_status_serializes_as_column_name() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            json!("In Progress")
        );
        let status: TaskStatus = serde_json::from_value(json!("Done")).unwrap();
        assert_eq!(status, TaskStatus::Done);
    }

    #[test]
    fn test_active_statuses() {
        assert!(TaskStatus::Todo.is_active());
        assert!(TaskStatus::InProgress.is_active());
        assert!(!TaskStatus::Done.is_active());
    }

    #[test]
    fn test_priority_parse_rejects_unknown() {
        assert_eq!("High".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("Urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_changes_distinguish_null_from_missing() {
        let missing: TaskChanges = serde_json::from_value(json!({"priority": "High"})).unwrap();
        assert_eq!(missing.assignee_id, None);

        let cleared: TaskChanges = serde_json::from_value(json!({"assignee_id": null})).unwrap();
        assert_eq!(cleared.assignee_id, Some(None));

        let id = Uuid::new_v4();
        let set: TaskChanges = serde_json::from_value(json!({"assignee_id": id})).unwrap();
        assert_eq!(set.assignee_id, Some(Some(id)));
    }

    #[test]
    fn test_apply_changes_leaves_version_alone() {
        let mut task = sample_task();
        task.assignee_id = Some(Uuid::new_v4());

        let changes = TaskChanges {
            status: Some(TaskStatus::Done),
            assignee_id: Some(None),
            ..Default::default()
        };
        changes.apply_to(&mut task);

        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.assignee_id, None);
        assert_eq!(task.version, 0);
        assert_eq!(task.title, "Write release notes");
    }

    #[test]
    fn test_empty_changes() {
        assert!(TaskChanges::default().is_empty());
        assert!(!TaskChanges::move_to(TaskStatus::Done).is_empty());
    }

    #[test]
    fn test_editable_by_creator_and_assignee_only() {
        let mut task = sample_task();
        let assignee = Uuid::new_v4();
        task.assignee_id = Some(assignee);

        assert!(task.is_editable_by(task.creator_id));
        assert!(task.is_editable_by(assignee));
        assert!(!task.is_editable_by(Uuid::new_v4()));
    }

    #[test]
    fn test_done_tasks_do_not_count_as_load() {
        let mut task = sample_task();
        assert!(task.counts_toward(task.creator_id));
        task.status = TaskStatus::Done;
        assert!(!task.counts_toward(task.creator_id));
    }
}
