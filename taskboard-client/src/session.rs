/// Live board session
///
/// A [`Session`] owns the client's view of the board and keeps it in step
/// with the server:
///
/// - edits go through [`LocalBoard`] first, so they show before the server
///   answers, then to the API with the version they were based on
/// - a `409` turns the edit into a [`Conflict`] holding the freshly fetched
///   authoritative record; [`Session::resolve`] settles it
/// - [`Session::run`] keeps the event stream open and applies every event,
///   including the echo of this client's own changes
///
/// The event stream has no replay, so the board is re-fetched each time the
/// stream (re)connects.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_client::api::HttpBoardApi;
/// use taskboard_client::session::Session;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(api: HttpBoardApi) -> Result<(), Box<dyn std::error::Error>> {
/// let session = Arc::new(Session::new(Arc::new(api)));
/// let shutdown = CancellationToken::new();
///
/// let runner = {
///     let session = session.clone();
///     let shutdown = shutdown.clone();
///     tokio::spawn(async move { session.run(shutdown).await })
/// };
///
/// // ... later
/// shutdown.cancel();
/// runner.await?;
/// # Ok(())
/// # }
/// ```

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use taskboard_shared::board::NewTask;
use taskboard_shared::events::BoardEvent;
use taskboard_shared::models::{ActionLogDetails, Task, TaskChanges};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::activity::ActivityFeed;
use crate::api::{BoardApi, EventStream};
use crate::error::{ClientError, ClientResult};
use crate::reconcile::{Conflict, EditKind, LocalBoard, Resolution};

/// Default wait before reopening a dropped event stream
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Notification that the visible state changed
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// The whole board was re-fetched
    Refreshed,

    /// A task's view changed (created, updated, or reverted)
    TaskChanged(Uuid),

    TaskRemoved(Uuid),

    /// An edit was rejected and awaits resolution
    ConflictOpened(Uuid),

    /// An entry was added to the activity feed
    ActivityLogged(ActionLogDetails),
}

/// Result of submitting an edit
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The server accepted the change
    Confirmed(Task),

    /// The server holds a newer version; see [`Session::conflicts`]
    Conflicted(Conflict),

    /// The conflict was settled by keeping the server's state
    Discarded,
}

pub struct Session<A: BoardApi + ?Sized> {
    api: Arc<A>,
    board: Mutex<LocalBoard>,
    activity: Mutex<ActivityFeed>,
    updates: broadcast::Sender<SessionUpdate>,
    reconnect_delay: Duration,
}

impl<A: BoardApi + ?Sized> Session<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            api,
            board: Mutex::new(LocalBoard::new()),
            activity: Mutex::new(ActivityFeed::new()),
            updates,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Subscribes to state change notifications
    pub fn updates(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Visible tasks, newest first
    pub async fn tasks(&self) -> Vec<Task> {
        self.board.lock().await.tasks()
    }

    pub async fn task(&self, task_id: Uuid) -> Option<Task> {
        self.board.lock().await.view(task_id)
    }

    pub async fn conflicts(&self) -> Vec<Conflict> {
        self.board.lock().await.conflicts()
    }

    pub async fn activity(&self) -> Vec<ActionLogDetails> {
        self.activity.lock().await.entries().to_vec()
    }

    /// Re-fetches the board and the activity feed
    pub async fn refresh(&self) -> ClientResult<()> {
        let tasks = self.api.list_tasks().await?;
        let activity = self.api.recent_activity().await?;

        let count = tasks.len();
        self.board.lock().await.replace_all(tasks);
        self.activity.lock().await.replace(activity);

        tracing::debug!(tasks = count, "Board refreshed");
        self.notify(SessionUpdate::Refreshed);
        Ok(())
    }

    /// Edits a task, showing the change before the server confirms it
    pub async fn edit(&self, task_id: Uuid, changes: TaskChanges) -> ClientResult<EditOutcome> {
        let version = self.board.lock().await.begin_edit(task_id, changes.clone())?;
        self.notify(SessionUpdate::TaskChanged(task_id));

        self.submit(task_id, version, EditKind::Update(changes)).await
    }

    /// Asks the server to assign the task to the least-loaded user
    pub async fn smart_assign(&self, task_id: Uuid) -> ClientResult<EditOutcome> {
        let version = self.board.lock().await.begin_smart_assign(task_id)?;
        self.submit(task_id, version, EditKind::SmartAssign).await
    }

    /// Settles a conflict by overwriting or discarding
    pub async fn resolve(&self, task_id: Uuid, resolution: Resolution) -> ClientResult<EditOutcome> {
        let retry = self.board.lock().await.resolve(task_id, resolution)?;

        match retry {
            Some(retry) => {
                tracing::info!(
                    task_id = %task_id,
                    version = retry.version,
                    "Overwriting after conflict"
                );
                self.notify(SessionUpdate::TaskChanged(task_id));
                self.submit(retry.task_id, retry.version, retry.kind).await
            }
            None => {
                tracing::info!(task_id = %task_id, "Discarded conflicting edit");
                self.notify(SessionUpdate::TaskChanged(task_id));
                Ok(EditOutcome::Discarded)
            }
        }
    }

    async fn submit(&self, task_id: Uuid, version: i64, kind: EditKind) -> ClientResult<EditOutcome> {
        let result = match &kind {
            EditKind::Update(changes) => self.api.update_task(task_id, version, changes).await,
            EditKind::SmartAssign => self.api.smart_assign(task_id, version).await,
        };

        match result {
            Ok(task) => {
                self.board.lock().await.confirm(task.clone());
                self.notify(SessionUpdate::TaskChanged(task_id));
                Ok(EditOutcome::Confirmed(task))
            }
            Err(ClientError::Conflict { message }) => {
                tracing::info!(task_id = %task_id, version, %message, "Edit conflicted");
                let authoritative = self.fetch_authoritative(task_id).await;

                let conflict = {
                    let mut board = self.board.lock().await;
                    match authoritative {
                        Ok(task) => board.conflict(task_id, task),
                        Err(e) => {
                            tracing::warn!(
                                task_id = %task_id,
                                error = %e,
                                "Failed to fetch current task after conflict"
                            );
                            board.mark_conflicted(task_id)
                        }
                    }
                };
                // The edit is already gone when a delete arrived meanwhile
                let conflict = conflict.unwrap_or(Conflict {
                    task_id,
                    attempted: kind,
                    authoritative: None,
                });

                self.notify(SessionUpdate::ConflictOpened(task_id));
                Ok(EditOutcome::Conflicted(conflict))
            }
            Err(e) => {
                // The write may still have committed; the event stream will
                // bring the server state either way.
                tracing::warn!(task_id = %task_id, error = %e, "Edit failed");
                self.board.lock().await.fail(task_id);
                self.notify(SessionUpdate::TaskChanged(task_id));
                Err(e)
            }
        }
    }

    /// Current server record after a conflict; `Ok(None)` if the task is gone
    async fn fetch_authoritative(&self, task_id: Uuid) -> ClientResult<Option<Task>> {
        match self.api.get_task(task_id).await {
            Ok(task) => Ok(Some(task)),
            Err(ClientError::NotFound(_)) | Err(ClientError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_task(&self, task: NewTask) -> ClientResult<Task> {
        let created = self.api.create_task(&task).await?;
        self.apply_event(BoardEvent::TaskCreated(created.clone())).await;
        Ok(created)
    }

    pub async fn delete_task(&self, task_id: Uuid) -> ClientResult<()> {
        let id = self.api.delete_task(task_id).await?;
        self.apply_event(BoardEvent::TaskDeleted(id)).await;
        Ok(())
    }

    /// Applies one event from the stream
    pub async fn apply_event(&self, event: BoardEvent) {
        match event {
            BoardEvent::NewActionLogged(entry) => {
                if self.activity.lock().await.push(entry.clone()) {
                    self.notify(SessionUpdate::ActivityLogged(entry));
                }
            }
            event => {
                let Some(task_id) = event.task_id() else {
                    return;
                };
                let update = match event {
                    BoardEvent::TaskDeleted(_) => SessionUpdate::TaskRemoved(task_id),
                    _ => SessionUpdate::TaskChanged(task_id),
                };
                if self.board.lock().await.apply_event(&event) {
                    self.notify(update);
                }
            }
        }
    }

    /// Follows the event stream until `shutdown` is cancelled
    ///
    /// Reconnects after any stream failure, re-fetching the board each time
    /// since events sent while disconnected are lost.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("Board session started");

        while !shutdown.is_cancelled() {
            match self.api.subscribe().await {
                Ok(stream) => {
                    // Subscribe before fetching so nothing falls in between
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "Failed to refresh board after connecting");
                    }
                    self.consume(stream, &shutdown).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to open event stream");
                }
            }

            if shutdown.is_cancelled() {
                break;
            }

            tracing::info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Reconnecting to event stream"
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        tracing::info!("Board session stopped");
    }

    async fn consume(&self, mut stream: EventStream, shutdown: &CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                item = stream.next() => match item {
                    Some(Ok(event)) => self.apply_event(event).await,
                    Some(Err(ClientError::Decode(e))) => {
                        tracing::warn!(error = %e, "Skipping undecodable event");
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Event stream failed");
                        return;
                    }
                    None => {
                        tracing::info!("Event stream closed by server");
                        return;
                    }
                },
            }
        }
    }

    fn notify(&self, update: SessionUpdate) {
        // Nobody listening is fine
        let _ = self.updates.send(update);
    }
}
