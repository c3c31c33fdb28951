/// Board core
///
/// Everything that makes concurrent editing safe lives here:
///
/// - `validation`: title and assignee rules checked before every write
/// - `concurrency`: the version-checked conditional update
/// - `assignment`: least-loaded user selection for smart assign
/// - `activity`: audit descriptions and best-effort logging
/// - `service`: [`BoardService`], which wires the above to the stores and the
///   event publisher
///
/// # Mutation flow
///
/// ```text
/// request(version V) → validate → conditional update (V → V+1)
///                                   ├─ miss → VersionConflict (nothing written)
///                                   └─ hit  → log activity → publish event
/// ```
///
/// Events are published only after the write has committed, and never for
/// a rejected write. There is no automatic retry: a conflict goes back to the
/// caller so a person can decide whether to overwrite or discard.

pub mod activity;
pub mod assignment;
pub mod concurrency;
pub mod service;
pub mod validation;

use uuid::Uuid;

use crate::auth::middleware::AuthContext;
use crate::store::StoreError;

pub use activity::ActivityLogger;
pub use service::{BoardService, NewTask};

/// Error type for board operations
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Missing or malformed input
    #[error("{0}")]
    InvalidRequest(String),

    /// The creator already has a task with this title
    #[error("You already have a task titled \"{0}\"")]
    DuplicateTitle(String),

    /// The title is one of the column names
    #[error("\"{0}\" is a column name and cannot be used as a task title")]
    ReservedTitle(String),

    /// The requested assignee does not exist
    #[error("Assignee {0} does not exist")]
    UnknownAssignee(Uuid),

    /// The caller may not perform this operation on this task
    #[error("{0}")]
    NotAuthorized(String),

    /// No such task
    #[error("Task {0} not found")]
    NotFound(Uuid),

    /// The caller's version is stale (or the task no longer exists)
    #[error("Task has been updated by another user. Please refresh and try again.")]
    VersionConflict {
        task_id: Uuid,
        expected_version: i64,
    },

    /// Smart assign found no users at all
    #[error("No users available to assign tasks")]
    NoEligibleUsers,

    /// Storage failure
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateTitle(title) => BoardError::DuplicateTitle(title),
            other => BoardError::Store(other),
        }
    }
}

/// The authenticated user performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
}

impl Actor {
    pub fn new(user_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

impl From<&AuthContext> for Actor {
    fn from(auth: &AuthContext) -> Self {
        Self::new(auth.user_id, auth.username.clone())
    }
}
