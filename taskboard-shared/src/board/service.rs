/// Board service
///
/// [`BoardService`] is the only way tasks change. Each mutation validates its
/// input, writes through the [`ConcurrencyController`] (or a plain insert for
/// creation), publishes the new state, and then records one activity entry.
/// The task event goes out right after the commit; the publisher is wrapped
/// in an [`OrderedPublisher`] so events for one task never go out below a
/// version already sent. The publisher and the stores are handed in at
/// construction; nothing here reaches for a global.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_shared::board::{Actor, BoardService, NewTask};
/// use taskboard_shared::events::BroadcastHub;
/// use taskboard_shared::store::Stores;
///
/// # async fn example(actor: Actor) -> Result<(), Box<dyn std::error::Error>> {
/// let hub = BroadcastHub::default();
/// let board = BoardService::new(Stores::memory(), Arc::new(hub.clone()));
///
/// let task = board
///     .create_task(&actor, NewTask::titled("Write release notes"))
///     .await?;
/// assert_eq!(task.version, 0);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::activity::{self, ActivityLogger};
use super::assignment::{load_candidates, pick_least_loaded};
use super::concurrency::{require_version, ConcurrencyController};
use super::validation::{normalize_description, validate_title};
use super::{Actor, BoardError};
use crate::events::{BoardEvent, OrderedPublisher, Publisher};
use crate::models::{
    ActionKind, ActionLogDetails, CreateTask, NewActionLogEntry, Task, TaskChanges, TaskDetails,
    TaskPriority, TaskStatus, User, UserSummary, RECENT_ACTIVITY_LIMIT,
};
use crate::store::Stores;

/// Request body for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Defaults to `Todo`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    /// Defaults to `Medium`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Task operations for authenticated users
pub struct BoardService {
    stores: Stores,
    controller: ConcurrencyController,
    activity: ActivityLogger,
    publisher: Arc<dyn Publisher>,
}

impl BoardService {
    pub fn new(stores: Stores, publisher: Arc<dyn Publisher>) -> Self {
        let publisher: Arc<dyn Publisher> = Arc::new(OrderedPublisher::new(publisher));
        let controller = ConcurrencyController::new(stores.tasks.clone());
        let activity = ActivityLogger::new(
            stores.logs.clone(),
            stores.users.clone(),
            publisher.clone(),
        );

        Self {
            stores,
            controller,
            activity,
            publisher,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Tasks the actor created or is assigned to, newest first
    pub async fn list_tasks(&self, actor: &Actor) -> Result<Vec<TaskDetails>, BoardError> {
        let tasks = self.stores.tasks.list_tasks_for_user(actor.user_id).await?;

        let mut cache: HashMap<Uuid, Option<UserSummary>> = HashMap::new();
        let mut details = Vec::with_capacity(tasks.len());
        for task in tasks {
            let creator = self.summary_cached(&mut cache, Some(task.creator_id)).await?;
            let assignee = self.summary_cached(&mut cache, task.assignee_id).await?;
            details.push(TaskDetails {
                task,
                creator,
                assignee,
            });
        }

        Ok(details)
    }

    /// A single task the actor created or is assigned to
    pub async fn get_task(&self, actor: &Actor, task_id: Uuid) -> Result<TaskDetails, BoardError> {
        let task = self.load_task(task_id).await?;
        if !task.is_visible_to(actor.user_id) {
            return Err(BoardError::NotAuthorized(
                "Not authorized to view this task".to_string(),
            ));
        }

        let creator = self.summary(task.creator_id).await?;
        let assignee = match task.assignee_id {
            Some(id) => self.summary(id).await?,
            None => None,
        };

        Ok(TaskDetails {
            task,
            creator,
            assignee,
        })
    }

    /// Creates a task at version 0
    pub async fn create_task(&self, actor: &Actor, input: NewTask) -> Result<Task, BoardError> {
        let title = validate_title(&input.title)?;

        if self
            .stores
            .tasks
            .title_taken(actor.user_id, &title, None)
            .await?
        {
            return Err(BoardError::DuplicateTitle(title));
        }
        if let Some(assignee_id) = input.assignee_id {
            self.require_user(assignee_id).await?;
        }

        let task = self
            .stores
            .tasks
            .insert_task(CreateTask {
                title,
                description: normalize_description(input.description),
                status: input.status.unwrap_or_default(),
                priority: input.priority.unwrap_or_default(),
                creator_id: actor.user_id,
                assignee_id: input.assignee_id,
            })
            .await?;

        tracing::info!(
            task_id = %task.id,
            user_id = %actor.user_id,
            title = %task.title,
            "Task created"
        );

        self.broadcast(BoardEvent::TaskCreated(task.clone())).await;
        self.activity
            .record(
                actor,
                NewActionLogEntry {
                    user_id: actor.user_id,
                    action: ActionKind::Created,
                    task_id: Some(task.id),
                    task_title: task.title.clone(),
                    description: activity::describe_created(actor, &task.title),
                },
            )
            .await;

        Ok(task)
    }

    /// Applies `changes` if the task is still at `version`
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for a missing version is raised before any storage
    /// access. A stale version yields `VersionConflict` and leaves the task
    /// untouched.
    pub async fn update_task(
        &self,
        actor: &Actor,
        task_id: Uuid,
        version: Option<i64>,
        mut changes: TaskChanges,
    ) -> Result<Task, BoardError> {
        let version = require_version(version)?;
        let existing = self.load_task(task_id).await?;

        if !existing.is_editable_by(actor.user_id) {
            return Err(BoardError::NotAuthorized(
                "Not authorized to update this task".to_string(),
            ));
        }

        if let Some(title) = changes.title.take() {
            let title = validate_title(&title)?;
            if title != existing.title
                && self
                    .stores
                    .tasks
                    .title_taken(existing.creator_id, &title, Some(task_id))
                    .await?
            {
                return Err(BoardError::DuplicateTitle(title));
            }
            changes.title = Some(title);
        }
        if let Some(description) = changes.description.take() {
            changes.description = Some(normalize_description(description));
        }

        let assignee = match changes.assignee_id {
            Some(Some(assignee_id)) => Some(self.require_user(assignee_id).await?),
            _ => None,
        };

        ensure_current(&existing, version)?;
        let updated = self.controller.apply(task_id, version, &changes).await?;

        tracing::info!(
            task_id = %task_id,
            user_id = %actor.user_id,
            version = updated.version,
            "Task updated"
        );

        self.broadcast(BoardEvent::TaskUpdated(updated.clone()))
            .await;

        let description = activity::describe_update(
            actor,
            &existing,
            &updated,
            assignee.as_ref().map(|u| u.username.as_str()),
        );
        self.activity
            .record(
                actor,
                NewActionLogEntry {
                    user_id: actor.user_id,
                    action: activity::kind_for_update(&existing, &updated),
                    task_id: Some(task_id),
                    task_title: updated.title.clone(),
                    description,
                },
            )
            .await;

        Ok(updated)
    }

    /// Removes a task; only its creator may do this
    pub async fn delete_task(&self, actor: &Actor, task_id: Uuid) -> Result<Uuid, BoardError> {
        let task = self.load_task(task_id).await?;

        if task.creator_id != actor.user_id {
            return Err(BoardError::NotAuthorized(
                "Not authorized to delete this task".to_string(),
            ));
        }

        if !self.stores.tasks.delete_task(task_id).await? {
            return Err(BoardError::NotFound(task_id));
        }

        tracing::info!(task_id = %task_id, user_id = %actor.user_id, "Task deleted");

        self.broadcast(BoardEvent::TaskDeleted(task_id)).await;
        self.activity
            .record(
                actor,
                NewActionLogEntry {
                    user_id: actor.user_id,
                    action: ActionKind::Deleted,
                    task_id: None,
                    task_title: task.title.clone(),
                    description: activity::describe_deleted(actor, &task.title),
                },
            )
            .await;

        Ok(task_id)
    }

    /// Assigns the task to the least-loaded user
    ///
    /// Goes through the same version-checked write as [`Self::update_task`].
    pub async fn smart_assign(
        &self,
        actor: &Actor,
        task_id: Uuid,
        version: Option<i64>,
    ) -> Result<Task, BoardError> {
        let version = require_version(version)?;
        let existing = self.load_task(task_id).await?;

        if !existing.is_editable_by(actor.user_id) {
            return Err(BoardError::NotAuthorized(
                "Not authorized to assign this task".to_string(),
            ));
        }

        let candidates =
            load_candidates(self.stores.users.as_ref(), self.stores.tasks.as_ref()).await?;
        let winner = pick_least_loaded(&candidates).ok_or(BoardError::NoEligibleUsers)?;

        tracing::debug!(
            task_id = %task_id,
            assignee_id = %winner.user.id,
            active_tasks = winner.active_tasks,
            candidates = candidates.len(),
            "Smart assign picked user"
        );

        ensure_current(&existing, version)?;
        let updated = self
            .controller
            .apply(task_id, version, &TaskChanges::assign(Some(winner.user.id)))
            .await?;

        tracing::info!(
            task_id = %task_id,
            user_id = %actor.user_id,
            assignee_id = %winner.user.id,
            version = updated.version,
            "Task smart-assigned"
        );

        self.broadcast(BoardEvent::TaskUpdated(updated.clone()))
            .await;
        self.activity
            .record(
                actor,
                NewActionLogEntry {
                    user_id: actor.user_id,
                    action: ActionKind::Assigned,
                    task_id: Some(task_id),
                    task_title: updated.title.clone(),
                    description: activity::describe_smart_assign(
                        actor,
                        &updated.title,
                        &winner.user.username,
                    ),
                },
            )
            .await;

        Ok(updated)
    }

    /// The newest activity entries, newest first
    pub async fn recent_activity(&self) -> Result<Vec<ActionLogDetails>, BoardError> {
        Ok(self.activity.recent(RECENT_ACTIVITY_LIMIT).await?)
    }

    /// Every registered user, in registration order
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, BoardError> {
        let users = self.stores.users.list_users().await?;
        Ok(users.iter().map(User::summary).collect())
    }

    async fn load_task(&self, task_id: Uuid) -> Result<Task, BoardError> {
        self.stores
            .tasks
            .find_task(task_id)
            .await?
            .ok_or(BoardError::NotFound(task_id))
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User, BoardError> {
        self.stores
            .users
            .find_user(user_id)
            .await?
            .ok_or(BoardError::UnknownAssignee(user_id))
    }

    async fn summary(&self, user_id: Uuid) -> Result<Option<UserSummary>, BoardError> {
        Ok(self
            .stores
            .users
            .find_user(user_id)
            .await?
            .map(|u| u.summary()))
    }

    async fn summary_cached(
        &self,
        cache: &mut HashMap<Uuid, Option<UserSummary>>,
        user_id: Option<Uuid>,
    ) -> Result<Option<UserSummary>, BoardError> {
        let Some(user_id) = user_id else {
            return Ok(None);
        };
        if let Some(summary) = cache.get(&user_id) {
            return Ok(summary.clone());
        }
        let summary = self.summary(user_id).await?;
        cache.insert(user_id, summary.clone());
        Ok(summary)
    }

    /// Publishes after commit; failures never reach the caller
    async fn broadcast(&self, event: BoardEvent) {
        let name = event.name();
        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(error = %e, event = name, "Failed to broadcast board event");
        }
    }
}

/// Rejects early when the task has already moved past `version`
///
/// The conditional write stays the authority; this only spares a write that
/// is certain to miss.
fn ensure_current(task: &Task, version: i64) -> Result<(), BoardError> {
    if task.version != version {
        tracing::info!(
            task_id = %task.id,
            expected_version = version,
            current_version = task.version,
            "Rejecting update with stale version"
        );
        return Err(BoardError::VersionConflict {
            task_id: task.id,
            expected_version: version,
        });
    }
    Ok(())
}
