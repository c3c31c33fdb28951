/// Common test utilities for client integration tests
///
/// Provides an in-process [`BoardApi`] that calls [`BoardService`] directly
/// and streams events from a [`BroadcastHub`], so sessions can be exercised
/// against real board semantics without a server.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taskboard_client::api::{BoardApi, EventStream};
use taskboard_client::error::{ClientError, ClientResult};
use taskboard_shared::board::{Actor, BoardError, BoardService, NewTask};
use taskboard_shared::events::BroadcastHub;
use taskboard_shared::models::{
    ActionLogDetails, CreateUser, Task, TaskChanges, UserSummary,
};
use taskboard_shared::store::Stores;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// A board shared by several test users
pub struct TestBoard {
    pub board: Arc<BoardService>,
    pub hub: BroadcastHub,
}

impl TestBoard {
    pub fn new() -> Self {
        let hub = BroadcastHub::new(64);
        let board = Arc::new(BoardService::new(Stores::memory(), Arc::new(hub.clone())));
        Self { board, hub }
    }

    /// Registers a user and returns an API acting as them
    pub async fn user(&self, username: &str) -> Arc<InProcessApi> {
        let user = self
            .board
            .stores()
            .users
            .insert_user(CreateUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "not-a-real-hash".to_string(),
            })
            .await
            .unwrap();

        Arc::new(InProcessApi {
            board: self.board.clone(),
            hub: self.hub.clone(),
            actor: Actor::new(user.id, user.username),
            task_reads_fail: AtomicBool::new(false),
        })
    }
}

/// [`BoardApi`] that skips HTTP
pub struct InProcessApi {
    board: Arc<BoardService>,
    hub: BroadcastHub,
    pub actor: Actor,
    task_reads_fail: AtomicBool,
}

impl InProcessApi {
    pub fn user_id(&self) -> Uuid {
        self.actor.user_id
    }

    /// Makes `get_task` fail as if the server were unreachable
    pub fn fail_task_reads(&self, fail: bool) {
        self.task_reads_fail.store(fail, Ordering::SeqCst);
    }
}

/// Same status mapping the HTTP layer applies
fn to_client_error(err: BoardError) -> ClientError {
    match err {
        BoardError::VersionConflict { .. } => ClientError::Conflict {
            message: err.to_string(),
        },
        BoardError::NotFound(_) => ClientError::NotFound(err.to_string()),
        BoardError::NotAuthorized(_) => ClientError::Unauthorized(err.to_string()),
        BoardError::Store(_) => ClientError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        },
        other => ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl BoardApi for InProcessApi {
    async fn list_tasks(&self) -> ClientResult<Vec<Task>> {
        let tasks = self
            .board
            .list_tasks(&self.actor)
            .await
            .map_err(to_client_error)?;
        Ok(tasks.into_iter().map(|details| details.task).collect())
    }

    async fn get_task(&self, task_id: Uuid) -> ClientResult<Task> {
        if self.task_reads_fail.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream unavailable".to_string(),
            });
        }
        let details = self
            .board
            .get_task(&self.actor, task_id)
            .await
            .map_err(to_client_error)?;
        Ok(details.task)
    }

    async fn create_task(&self, task: &NewTask) -> ClientResult<Task> {
        self.board
            .create_task(&self.actor, task.clone())
            .await
            .map_err(to_client_error)
    }

    async fn update_task(
        &self,
        task_id: Uuid,
        version: i64,
        changes: &TaskChanges,
    ) -> ClientResult<Task> {
        self.board
            .update_task(&self.actor, task_id, Some(version), changes.clone())
            .await
            .map_err(to_client_error)
    }

    async fn delete_task(&self, task_id: Uuid) -> ClientResult<Uuid> {
        self.board
            .delete_task(&self.actor, task_id)
            .await
            .map_err(to_client_error)
    }

    async fn smart_assign(&self, task_id: Uuid, version: i64) -> ClientResult<Task> {
        self.board
            .smart_assign(&self.actor, task_id, Some(version))
            .await
            .map_err(to_client_error)
    }

    async fn recent_activity(&self) -> ClientResult<Vec<ActionLogDetails>> {
        self.board.recent_activity().await.map_err(to_client_error)
    }

    async fn list_users(&self) -> ClientResult<Vec<UserSummary>> {
        self.board.list_users().await.map_err(to_client_error)
    }

    async fn subscribe(&self) -> ClientResult<EventStream> {
        let receiver = self.hub.subscribe();
        let events = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((Ok(event), receiver)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(events.boxed())
    }
}
