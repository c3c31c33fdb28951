/// Optimistic concurrency control
///
/// Callers present the version of the task they last saw. The
/// [`ConcurrencyController`] turns that into a single conditional write
/// against the store; whichever writer reaches storage first with the
/// current version wins, and every other writer holding that same version
/// gets [`BoardError::VersionConflict`]. No lock is held while a user is
/// thinking, and nothing is retried automatically.

use std::sync::Arc;
use uuid::Uuid;

use super::BoardError;
use crate::models::{Task, TaskChanges};
use crate::store::TaskStore;

/// Checks that a request carried a usable version
///
/// Runs before any storage access: a missing or negative version is an
/// `InvalidRequest`, not a conflict.
pub fn require_version(version: Option<i64>) -> Result<i64, BoardError> {
    match version {
        Some(v) if v >= 0 => Ok(v),
        Some(v) => Err(BoardError::InvalidRequest(format!(
            "Task version must be a non-negative integer, got {}",
            v
        ))),
        None => Err(BoardError::InvalidRequest(
            "Task version is required for updates".to_string(),
        )),
    }
}

/// Applies version-checked updates
#[derive(Clone)]
pub struct ConcurrencyController {
    tasks: Arc<dyn TaskStore>,
}

impl ConcurrencyController {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }

    /// Writes `changes` if and only if the task is still at `expected_version`
    ///
    /// # Errors
    ///
    /// - `VersionConflict` if the stored version differs or the task is gone
    /// - `DuplicateTitle` if a concurrent write claimed the new title first
    /// - `Store` on storage failure
    pub async fn apply(
        &self,
        task_id: Uuid,
        expected_version: i64,
        changes: &TaskChanges,
    ) -> Result<Task, BoardError> {
        match self
            .tasks
            .conditional_update(task_id, expected_version, changes)
            .await?
        {
            Some(task) => {
                tracing::debug!(
                    task_id = %task_id,
                    version = task.version,
                    "Conditional update applied"
                );
                Ok(task)
            }
            None => {
                tracing::info!(
                    task_id = %task_id,
                    expected_version,
                    "Conditional update rejected: stale version"
                );
                Err(BoardError::VersionConflict {
                    task_id,
                    expected_version,
                })
            }
        }
    }
}
