/// Task endpoints
///
/// # Endpoints
///
/// - `GET    /api/tasks` - Tasks the caller created or is assigned to
/// - `POST   /api/tasks` - Create a task
/// - `GET    /api/tasks/:id` - Fetch one task
/// - `PUT    /api/tasks/:id` - Version-checked update
/// - `DELETE /api/tasks/:id` - Creator-only delete
/// - `PUT    /api/tasks/:id/smart-assign` - Assign to the least-loaded user
///
/// # Versioning
///
/// `PUT` bodies must carry the `version` the client last saw. A stale
/// version gets `409 Conflict`:
///
/// ```json
/// {
///   "error": "conflict",
///   "message": "Task has been updated by another user. Please refresh and try again."
/// }
/// ```
///
/// Mutations are spawned onto the runtime, so a client that disconnects
/// mid-request does not cancel a write; the result still reaches everyone
/// through the event stream.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use taskboard_shared::{
    auth::middleware::AuthContext,
    board::{Actor, BoardError, NewTask},
    models::{Task, TaskChanges, TaskDetails},
};
use uuid::Uuid;

/// Update request: the observed version plus the fields to change
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskRequest {
    /// Version the client last saw
    #[serde(default)]
    pub version: Option<i64>,

    #[serde(flatten)]
    pub changes: TaskChanges,
}

/// Smart-assign request
#[derive(Debug, Clone, Deserialize)]
pub struct SmartAssignRequest {
    #[serde(default)]
    pub version: Option<i64>,
}

/// Delete response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteTaskResponse {
    pub id: Uuid,
    pub message: String,
}

/// List tasks visible to the caller, newest first
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TaskDetails>>> {
    let tasks = state.board.list_tasks(&Actor::from(&auth)).await?;
    Ok(Json(tasks))
}

/// Fetch one task
///
/// # Errors
///
/// - `401 Unauthorized`: Caller is neither creator nor assignee
/// - `404 Not Found`: No such task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskDetails>> {
    let task = state.board.get_task(&Actor::from(&auth), task_id).await?;
    Ok(Json(task))
}

/// Create a task at version 0
///
/// # Endpoint
///
/// ```text
/// POST /api/tasks
/// Content-Type: application/json
///
/// {
///   "title": "Write release notes",
///   "description": "For 1.2",
///   "status": "Todo",
///   "priority": "High",
///   "assignee_id": null
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Empty, duplicate or reserved title; unknown assignee
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(input) = payload?;
    let actor = Actor::from(&auth);

    let board = state.board.clone();
    let task = run_detached(async move { board.create_task(&actor, input).await }).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Version-checked update
///
/// # Errors
///
/// - `400 Bad Request`: Missing version, invalid title, unknown assignee
/// - `401 Unauthorized`: Caller is neither creator nor assignee
/// - `404 Not Found`: No such task
/// - `409 Conflict`: The task changed since `version`
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Json(req) = payload?;
    let actor = Actor::from(&auth);

    let board = state.board.clone();
    let task = run_detached(async move {
        board
            .update_task(&actor, task_id, req.version, req.changes)
            .await
    })
    .await?;

    Ok(Json(task))
}

/// Creator-only delete
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<DeleteTaskResponse>> {
    let actor = Actor::from(&auth);

    let board = state.board.clone();
    let id = run_detached(async move { board.delete_task(&actor, task_id).await }).await?;

    Ok(Json(DeleteTaskResponse {
        id,
        message: "Task removed".to_string(),
    }))
}

/// Assign to the user with the fewest active tasks
///
/// # Errors
///
/// - `400 Bad Request`: Missing version, or no users exist
/// - `409 Conflict`: The task changed since `version`
pub async fn smart_assign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    payload: Result<Json<SmartAssignRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Json(req) = payload?;
    let actor = Actor::from(&auth);

    let board = state.board.clone();
    let task =
        run_detached(async move { board.smart_assign(&actor, task_id, req.version).await })
            .await?;

    Ok(Json(task))
}

/// Runs a mutation on its own task so it completes even if the caller goes away
async fn run_detached<F, T>(mutation: F) -> ApiResult<T>
where
    F: Future<Output = Result<T, BoardError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(mutation).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::InternalError(format!("Mutation task failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskboard_shared::models::TaskStatus;

    #[test]
    fn test_update_request_splits_version_from_changes() {
        let req: UpdateTaskRequest = serde_json::from_value(json!({
            "version": 2,
            "status": "Done",
            "assignee_id": null
        }))
        .unwrap();

        assert_eq!(req.version, Some(2));
        assert_eq!(req.changes.status, Some(TaskStatus::Done));
        assert_eq!(req.changes.assignee_id, Some(None));
        assert!(req.changes.title.is_none());
    }

    #[test]
    fn test_update_request_without_version() {
        let req: UpdateTaskRequest =
            serde_json::from_value(json!({"priority": "Low"})).unwrap();
        assert_eq!(req.version, None);
    }
}
