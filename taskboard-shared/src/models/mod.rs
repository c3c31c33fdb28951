/// Board domain models
///
/// # Models
///
/// - `task`: Task cards, status columns, and partial change sets
/// - `user`: Registered users and their public summaries
/// - `action_log`: Append-only audit trail entries
///
/// Persistence lives in [`crate::store`]; these types are plain data.

pub mod action_log;
pub mod task;
pub mod user;

pub use action_log::{
    ActionKind, ActionLogDetails, ActionLogEntry, NewActionLogEntry, RECENT_ACTIVITY_LIMIT,
};
pub use task::{CreateTask, Task, TaskChanges, TaskDetails, TaskPriority, TaskStatus, COLUMN_NAMES};
pub use user::{normalize_email, CreateUser, User, UserSummary};
