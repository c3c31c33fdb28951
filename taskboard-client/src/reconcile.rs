/// Local board state and optimistic edits
///
/// [`LocalBoard`] keeps two things apart:
///
/// - the last server state seen for each task (from a fetch, a response, or
///   the event stream), and
/// - at most one pending edit per task, made by this client.
///
/// The visible board ([`LocalBoard::view`]) is the server state with the
/// pending edit laid over it. The overlay is only shown while the server
/// state is still at the version the edit was based on; as soon as any newer
/// version arrives the overlay disappears, whether that version carries our
/// own change or somebody else's.
///
/// # Edit lifecycle
///
/// ```text
/// begin_edit ──> Applying ──confirm──> (gone, server state updated)
///                   │
///                   ├──fail──> (gone, view reverts)
///                   │
///                   └──conflict──> Conflicted ──resolve(Discard)──> (gone)
///                                      │
///                                      └──resolve(Overwrite)──> Applying
///                                           (rebased on the authoritative version)
/// ```
///
/// A conflicted task shows the authoritative server record. Conflicts are
/// tracked per task; no other task's view is touched.
///
/// Deleted ids are remembered until the next full fetch, so a create or
/// update for the same id that arrives late cannot bring the task back.

use std::collections::{HashMap, HashSet};
use taskboard_shared::events::BoardEvent;
use taskboard_shared::models::{Task, TaskChanges};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// What the user tried to do
#[derive(Debug, Clone, PartialEq)]
pub enum EditKind {
    /// Field edits, including moving between columns
    Update(TaskChanges),

    /// Assignment to the least-loaded user; the result is only known once the
    /// server answers
    SmartAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// Sent, waiting for the server
    Applying,

    /// Rejected for a stale version; waiting for the user to decide
    Conflicted,
}

/// This client's in-flight or conflicted change to one task
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEdit {
    pub task_id: Uuid,

    /// Version the request carries
    pub base_version: i64,

    pub kind: EditKind,

    pub state: EditState,
}

/// How to settle a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Resubmit the attempted change on top of the authoritative version
    Overwrite,

    /// Keep the authoritative state and drop the attempted change
    Discard,
}

/// A conflict awaiting resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub task_id: Uuid,

    /// The change that was rejected
    pub attempted: EditKind,

    /// Current server record
    ///
    /// `None` if the task has since been deleted, or if nothing newer than
    /// the rejected version has been seen yet.
    pub authoritative: Option<Task>,
}

/// A request to resend after choosing [`Resolution::Overwrite`]
#[derive(Debug, Clone, PartialEq)]
pub struct Retry {
    pub task_id: Uuid,
    pub version: i64,
    pub kind: EditKind,
}

/// Client-side board
#[derive(Debug, Default)]
pub struct LocalBoard {
    server: HashMap<Uuid, Task>,
    pending: HashMap<Uuid, PendingEdit>,
    deleted: HashSet<Uuid>,
}

impl LocalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the server state with a full fetch
    ///
    /// Pending edits for tasks that are no longer listed are dropped.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.server = tasks.into_iter().map(|task| (task.id, task)).collect();
        self.deleted.clear();
        let server = &self.server;
        self.pending.retain(|id, _| server.contains_key(id));
    }

    /// Starts a field edit and returns the version to send
    pub fn begin_edit(&mut self, task_id: Uuid, changes: TaskChanges) -> ClientResult<i64> {
        self.begin(task_id, EditKind::Update(changes))
    }

    /// Starts a smart assign and returns the version to send
    pub fn begin_smart_assign(&mut self, task_id: Uuid) -> ClientResult<i64> {
        self.begin(task_id, EditKind::SmartAssign)
    }

    fn begin(&mut self, task_id: Uuid, kind: EditKind) -> ClientResult<i64> {
        if self.pending.contains_key(&task_id) {
            return Err(ClientError::EditPending(task_id));
        }
        let base_version = self
            .server
            .get(&task_id)
            .map(|task| task.version)
            .ok_or(ClientError::UnknownTask(task_id))?;

        self.pending.insert(
            task_id,
            PendingEdit {
                task_id,
                base_version,
                kind,
                state: EditState::Applying,
            },
        );
        Ok(base_version)
    }

    /// The server accepted the edit and returned the new record
    pub fn confirm(&mut self, task: Task) {
        self.pending.remove(&task.id);
        self.store(task);
    }

    /// The server rejected the edit for a stale version
    ///
    /// `authoritative` is the freshly fetched record, or `None` when the task
    /// no longer exists. Returns the conflict unless the edit was already
    /// dropped.
    pub fn conflict(&mut self, task_id: Uuid, authoritative: Option<Task>) -> Option<Conflict> {
        match authoritative {
            Some(task) => {
                self.store(task);
            }
            None => {
                self.server.remove(&task_id);
            }
        }

        self.mark_conflicted(task_id)
    }

    /// Like [`Self::conflict`], for when the current record could not be fetched
    ///
    /// Server state is left as it was. The conflict has no authoritative
    /// record until a newer version arrives on the event stream.
    pub fn mark_conflicted(&mut self, task_id: Uuid) -> Option<Conflict> {
        if let Some(edit) = self.pending.get_mut(&task_id) {
            edit.state = EditState::Conflicted;
        }
        self.pending
            .get(&task_id)
            .map(|edit| self.conflict_for(edit))
    }

    /// The request failed for some other reason; drop the edit
    pub fn fail(&mut self, task_id: Uuid) {
        self.pending.remove(&task_id);
    }

    /// Applies a broadcast event; returns whether the task view may have changed
    ///
    /// Re-applying an event, or applying one older than the state already
    /// held, changes nothing.
    pub fn apply_event(&mut self, event: &BoardEvent) -> bool {
        match event {
            BoardEvent::TaskCreated(task) | BoardEvent::TaskUpdated(task) => {
                if self.deleted.contains(&task.id) {
                    tracing::debug!(task_id = %task.id, "Ignoring event for deleted task");
                    return false;
                }
                self.store(task.clone())
            }
            BoardEvent::TaskDeleted(task_id) => {
                self.deleted.insert(*task_id);
                let removed = self.server.remove(task_id).is_some();
                // An edit still in flight will fail on its own; a conflict
                // stays so the user sees the task is gone.
                if self.pending.get(task_id).map(|edit| edit.state) == Some(EditState::Applying) {
                    self.pending.remove(task_id);
                }
                removed
            }
            BoardEvent::NewActionLogged(_) => false,
        }
    }

    /// Keeps `task` unless a newer version is already held
    fn store(&mut self, task: Task) -> bool {
        match self.server.get(&task.id) {
            Some(existing) if existing.version >= task.version => false,
            _ => {
                self.server.insert(task.id, task);
                true
            }
        }
    }

    /// The task as the user should see it
    pub fn view(&self, task_id: Uuid) -> Option<Task> {
        let mut task = self.server.get(&task_id)?.clone();

        if let Some(edit) = self.pending.get(&task_id) {
            if edit.state == EditState::Applying && edit.base_version == task.version {
                if let EditKind::Update(changes) = &edit.kind {
                    changes.apply_to(&mut task);
                }
            }
        }

        Some(task)
    }

    /// Last server state, without any local overlay
    pub fn server_task(&self, task_id: Uuid) -> Option<&Task> {
        self.server.get(&task_id)
    }

    /// All visible tasks, newest first
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .server
            .keys()
            .filter_map(|id| self.view(*id))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        tasks
    }

    pub fn pending(&self, task_id: Uuid) -> Option<&PendingEdit> {
        self.pending.get(&task_id)
    }

    /// Conflicts awaiting a decision
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.pending
            .values()
            .filter(|edit| edit.state == EditState::Conflicted)
            .map(|edit| self.conflict_for(edit))
            .collect()
    }

    fn conflict_for(&self, edit: &PendingEdit) -> Conflict {
        // The rejected version is known to be outdated
        let authoritative = self
            .server
            .get(&edit.task_id)
            .filter(|task| task.version > edit.base_version)
            .cloned();

        Conflict {
            task_id: edit.task_id,
            attempted: edit.kind.clone(),
            authoritative,
        }
    }

    /// Settles a conflict
    ///
    /// `Discard` returns `None`. `Overwrite` rebases the edit onto the latest
    /// known server version and returns the request to send.
    ///
    /// # Errors
    ///
    /// - `NoConflict` if the task has no conflicted edit
    /// - `TaskGone` when overwriting a task that was deleted (the edit is dropped)
    pub fn resolve(&mut self, task_id: Uuid, resolution: Resolution) -> ClientResult<Option<Retry>> {
        match self.pending.get(&task_id) {
            Some(edit) if edit.state == EditState::Conflicted => {}
            _ => return Err(ClientError::NoConflict(task_id)),
        }

        if resolution == Resolution::Discard {
            self.pending.remove(&task_id);
            return Ok(None);
        }

        let Some(version) = self.server.get(&task_id).map(|task| task.version) else {
            self.pending.remove(&task_id);
            return Err(ClientError::TaskGone(task_id));
        };

        let Some(edit) = self.pending.get_mut(&task_id) else {
            return Err(ClientError::NoConflict(task_id));
        };
        edit.base_version = version;
        edit.state = EditState::Applying;

        Ok(Some(Retry {
            task_id,
            version,
            kind: edit.kind.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use taskboard_shared::models::{TaskPriority, TaskStatus};

    fn task(title: &str, version: i64) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            creator_id: Uuid::new_v4(),
            assignee_id: None,
            version,
            created_at: now,
            updated_at: now,
        }
    }

    fn bumped(task: &Task, f: impl FnOnce(&mut Task)) -> Task {
        let mut next = task.clone();
        next.version += 1;
        f(&mut next);
        next
    }

    #[test]
    fn test_edit_shows_immediately() {
        let t = task("T", 2);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);

        let base = board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();
        assert_eq!(base, 2);

        let view = board.view(t.id).unwrap();
        assert_eq!(view.status, TaskStatus::Done);
        assert_eq!(view.version, 2);
        assert_eq!(board.server_task(t.id).unwrap().status, TaskStatus::Todo);
    }

    #[test]
    fn test_confirm_then_echo_is_idempotent() {
        let t = task("T", 0);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::InProgress))
            .unwrap();

        let accepted = bumped(&t, |t| t.status = TaskStatus::InProgress);
        board.confirm(accepted.clone());
        assert!(board.pending(t.id).is_none());

        // Our own broadcast arrives after the response
        assert!(!board.apply_event(&BoardEvent::TaskUpdated(accepted.clone())));
        assert_eq!(board.view(t.id).unwrap(), accepted);
    }

    #[test]
    fn test_broadcast_before_response() {
        let t = task("T", 0);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();

        let accepted = bumped(&t, |t| t.status = TaskStatus::Done);
        assert!(board.apply_event(&BoardEvent::TaskUpdated(accepted.clone())));

        // Overlay no longer applies; server truth already carries the change
        assert_eq!(board.view(t.id).unwrap(), accepted);

        board.confirm(accepted.clone());
        assert_eq!(board.view(t.id).unwrap(), accepted);
    }

    #[test]
    fn test_older_event_is_ignored() {
        let t = task("T", 3);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);

        let mut stale = t.clone();
        stale.version = 2;
        stale.title = "old".to_string();
        assert!(!board.apply_event(&BoardEvent::TaskUpdated(stale)));
        assert_eq!(board.view(t.id).unwrap().title, "T");
    }

    #[test]
    fn test_conflict_reverts_and_shows_authoritative() {
        let t = task("T", 2);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();

        let theirs = bumped(&t, |t| t.priority = TaskPriority::High);
        board.conflict(t.id, Some(theirs.clone()));

        assert_eq!(board.view(t.id).unwrap(), theirs);

        let conflicts = board.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].attempted,
            EditKind::Update(TaskChanges::move_to(TaskStatus::Done))
        );
        assert_eq!(conflicts[0].authoritative.as_ref(), Some(&theirs));

        // No second edit while the conflict is open
        assert!(matches!(
            board.begin_smart_assign(t.id),
            Err(ClientError::EditPending(_))
        ));
    }

    #[test]
    fn test_overwrite_rebases_on_authoritative_version() {
        let t = task("T", 2);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();
        board.conflict(t.id, Some(bumped(&t, |t| t.priority = TaskPriority::High)));

        let retry = board.resolve(t.id, Resolution::Overwrite).unwrap().unwrap();
        assert_eq!(retry.version, 3);
        assert_eq!(retry.kind, EditKind::Update(TaskChanges::move_to(TaskStatus::Done)));

        let view = board.view(t.id).unwrap();
        assert_eq!(view.status, TaskStatus::Done);
        assert_eq!(view.priority, TaskPriority::High);
        assert!(board.conflicts().is_empty());
    }

    #[test]
    fn test_overwrite_uses_newest_event_version() {
        let t = task("T", 2);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board.begin_smart_assign(t.id).unwrap();

        let v3 = bumped(&t, |_| {});
        board.conflict(t.id, Some(v3.clone()));
        board.apply_event(&BoardEvent::TaskUpdated(bumped(&v3, |_| {})));

        let retry = board.resolve(t.id, Resolution::Overwrite).unwrap().unwrap();
        assert_eq!(retry.version, 4);
        assert_eq!(retry.kind, EditKind::SmartAssign);
    }

    #[test]
    fn test_discard_keeps_authoritative() {
        let t = task("T", 2);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();
        let theirs = bumped(&t, |t| t.priority = TaskPriority::High);
        board.conflict(t.id, Some(theirs.clone()));

        assert_eq!(board.resolve(t.id, Resolution::Discard).unwrap(), None);
        assert!(board.pending(t.id).is_none());
        assert_eq!(board.view(t.id).unwrap(), theirs);

        assert!(matches!(
            board.resolve(t.id, Resolution::Discard),
            Err(ClientError::NoConflict(_))
        ));
    }

    #[test]
    fn test_overwrite_after_delete_is_task_gone() {
        let t = task("T", 1);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();
        board.conflict(t.id, Some(bumped(&t, |_| {})));

        board.apply_event(&BoardEvent::TaskDeleted(t.id));
        assert_eq!(board.conflicts()[0].authoritative, None);
        assert!(board.view(t.id).is_none());

        assert!(matches!(
            board.resolve(t.id, Resolution::Overwrite),
            Err(ClientError::TaskGone(_))
        ));
        assert!(board.pending(t.id).is_none());
    }

    #[test]
    fn test_conflict_leaves_other_tasks_alone() {
        let t1 = task("one", 2);
        let t2 = task("two", 5);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t1.clone(), t2.clone()]);

        board
            .begin_edit(t1.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();
        board
            .begin_edit(t2.id, TaskChanges::move_to(TaskStatus::InProgress))
            .unwrap();

        board.conflict(t1.id, Some(bumped(&t1, |_| {})));

        let view = board.view(t2.id).unwrap();
        assert_eq!(view.status, TaskStatus::InProgress);
        assert_eq!(board.pending(t2.id).unwrap().state, EditState::Applying);
    }

    #[test]
    fn test_unfetched_conflict_has_no_authoritative_record() {
        let t = task("T", 2);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(t.id, TaskChanges::move_to(TaskStatus::Done))
            .unwrap();

        let conflict = board.mark_conflicted(t.id).unwrap();
        assert_eq!(conflict.authoritative, None);
        assert_eq!(board.server_task(t.id), Some(&t));
        assert_eq!(board.view(t.id).unwrap(), t);

        // The newer version shows up once the stream delivers it
        let theirs = bumped(&t, |t| t.priority = TaskPriority::High);
        board.apply_event(&BoardEvent::TaskUpdated(theirs.clone()));
        assert_eq!(board.conflicts()[0].authoritative, Some(theirs));
    }

    #[test]
    fn test_late_update_does_not_resurrect_deleted_task() {
        let t = task("T", 0);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);

        assert!(board.apply_event(&BoardEvent::TaskDeleted(t.id)));
        assert!(!board.apply_event(&BoardEvent::TaskUpdated(bumped(&t, |_| {}))));
        assert!(!board.apply_event(&BoardEvent::TaskCreated(t.clone())));
        assert_eq!(board.tasks().len(), 0);

        // A full fetch is the source of truth again
        board.replace_all(vec![t.clone()]);
        assert_eq!(board.tasks(), vec![t]);
    }

    #[test]
    fn test_unknown_task_cannot_be_edited() {
        let mut board = LocalBoard::new();
        assert!(matches!(
            board.begin_edit(Uuid::new_v4(), TaskChanges::default()),
            Err(ClientError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_fail_reverts_view() {
        let t = task("T", 0);
        let mut board = LocalBoard::new();
        board.replace_all(vec![t.clone()]);
        board
            .begin_edit(
                t.id,
                TaskChanges {
                    title: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(board.view(t.id).unwrap().title, "renamed");

        board.fail(t.id);
        assert_eq!(board.view(t.id).unwrap(), t);
    }

    #[test]
    fn test_tasks_newest_first_and_refresh_drops_stale_edits() {
        let mut older = task("older", 0);
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = task("newer", 0);

        let mut board = LocalBoard::new();
        board.replace_all(vec![older.clone(), newer.clone()]);
        let titles: Vec<String> = board.tasks().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["newer", "older"]);

        board.begin_smart_assign(older.id).unwrap();
        board.replace_all(vec![newer.clone()]);
        assert!(board.pending(older.id).is_none());
        assert_eq!(board.tasks().len(), 1);
    }

    #[test]
    fn test_created_event_adds_task() {
        let mut board = LocalBoard::new();
        let t = task("fresh", 0);

        assert!(board.apply_event(&BoardEvent::TaskCreated(t.clone())));
        assert!(!board.apply_event(&BoardEvent::TaskCreated(t.clone())));
        assert_eq!(board.tasks(), vec![t]);
    }
}
