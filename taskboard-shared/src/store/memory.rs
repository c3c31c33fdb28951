/// In-memory store
///
/// Keeps users, tasks and the action log behind a single lock. The
/// conditional update performs its version check and write while holding the
/// write guard, which gives the same all-or-nothing behaviour as the SQL
/// `UPDATE ... WHERE version = $2`.
///
/// Used when no `DATABASE_URL` is configured and throughout the test suites.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ActionLogStore, StoreError, TaskStore, UserStore};
use crate::models::{
    ActionLogEntry, CreateTask, CreateUser, NewActionLogEntry, Task, TaskChanges, User,
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    tasks: HashMap<Uuid, Task>,
    logs: Vec<ActionLogEntry>,
}

impl State {
    fn title_taken(&self, creator_id: Uuid, title: &str, exclude: Option<Uuid>) -> bool {
        self.tasks.values().any(|task| {
            task.creator_id == creator_id && task.title == title && Some(task.id) != exclude
        })
    }
}

/// Store that lives entirely in process memory
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, data: CreateTask) -> Result<Task, StoreError> {
        let mut state = self.state.write().await;

        if state.title_taken(data.creator_id, &data.title, None) {
            return Err(StoreError::DuplicateTitle(data.title));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            creator_id: data.creator_id,
            assignee_id: data.assignee_id,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(task.id, task.clone());

        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.is_visible_to(user_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn title_taken(
        &self,
        creator_id: Uuid,
        title: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        Ok(self.state.read().await.title_taken(creator_id, title, exclude))
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let mut state = self.state.write().await;

        let (creator_id, current_version) = match state.tasks.get(&id) {
            Some(task) => (task.creator_id, task.version),
            None => return Ok(None),
        };
        if current_version != expected_version {
            return Ok(None);
        }
        if let Some(title) = &changes.title {
            if state.title_taken(creator_id, title, Some(id)) {
                return Err(StoreError::DuplicateTitle(title.clone()));
            }
        }

        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(task);
        task.version = expected_version + 1;
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.write().await.tasks.remove(&id).is_some())
    }

    async fn count_active_tasks(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        let count = state
            .tasks
            .values()
            .filter(|task| task.counts_toward(user_id))
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut state = self.state.write().await;

        if state
            .users
            .iter()
            .any(|u| u.username == data.username || u.email == data.email)
        {
            return Err(StoreError::DuplicateUser);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: data.username,
            email: data.email,
            password_hash: data.password_hash,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.state.read().await.users.clone())
    }
}

#[async_trait]
impl ActionLogStore for MemoryStore {
    async fn append(&self, entry: NewActionLogEntry) -> Result<ActionLogEntry, StoreError> {
        let entry = ActionLogEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            action: entry.action,
            task_id: entry.task_id,
            task_title: entry.task_title,
            description: entry.description,
            created_at: Utc::now(),
        };
        self.state.write().await.logs.push(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActionLogEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state.logs.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionKind, TaskPriority, TaskStatus};
    use std::sync::Arc;

    fn new_task(creator_id: Uuid, title: &str) -> CreateTask {
        CreateTask {
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            creator_id,
            assignee_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_starts_at_version_zero() {
        let store = MemoryStore::new();
        let task = store.insert_task(new_task(Uuid::new_v4(), "a")).await.unwrap();
        assert_eq!(task.version, 0);
        assert_eq!(store.find_task(task.id).await.unwrap(), Some(task));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_title_for_same_creator() {
        let store = MemoryStore::new();
        let creator = Uuid::new_v4();
        store.insert_task(new_task(creator, "Ship it")).await.unwrap();

        let err = store.insert_task(new_task(creator, "Ship it")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTitle(t) if t == "Ship it"));

        // Another creator may reuse the title
        assert!(store.insert_task(new_task(Uuid::new_v4(), "Ship it")).await.is_ok());
    }

    #[tokio::test]
    async fn test_conditional_update_matches_version() {
        let store = MemoryStore::new();
        let task = store.insert_task(new_task(Uuid::new_v4(), "a")).await.unwrap();

        let updated = store
            .conditional_update(task.id, 0, &TaskChanges::move_to(TaskStatus::Done))
            .await
            .unwrap()
            .expect("version matched");
        assert_eq!(updated.version, 1);
        assert_eq!(updated.status, TaskStatus::Done);

        let stale = store
            .conditional_update(task.id, 0, &TaskChanges::move_to(TaskStatus::Todo))
            .await
            .unwrap();
        assert!(stale.is_none());
        assert_eq!(store.find_task(task.id).await.unwrap().unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_conditional_update_missing_task_is_a_miss() {
        let store = MemoryStore::new();
        let result = store
            .conditional_update(Uuid::new_v4(), 0, &TaskChanges::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_updates_with_same_version_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let task = store.insert_task(new_task(Uuid::new_v4(), "race")).await.unwrap();

        let mut handles = Vec::new();
        for priority in [TaskPriority::Low, TaskPriority::High] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let changes = TaskChanges {
                    priority: Some(priority),
                    ..Default::default()
                };
                store.conditional_update(task.id, 0, &changes).await.unwrap()
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            if let Some(task) = handle.await.unwrap() {
                winners.push(task);
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.priority, winners[0].priority);
    }

    #[tokio::test]
    async fn test_count_active_tasks_ignores_done() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let a = store.insert_task(new_task(user, "a")).await.unwrap();
        store.insert_task(new_task(user, "b")).await.unwrap();
        store
            .conditional_update(a.id, 0, &TaskChanges::move_to(TaskStatus::Done))
            .await
            .unwrap();

        assert_eq!(store.count_active_tasks(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_returns_newest_first() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store
                .append(NewActionLogEntry {
                    user_id: Uuid::new_v4(),
                    action: ActionKind::Created,
                    task_id: None,
                    task_title: format!("task {}", i),
                    description: String::new(),
                })
                .await
                .unwrap();
        }

        let recent = store.recent(20).await.unwrap();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].task_title, "task 24");
        assert_eq!(recent[19].task_title, "task 5");
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let store = MemoryStore::new();
        let data = CreateUser {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "x".to_string(),
        };
        store.insert_user(data.clone()).await.unwrap();
        assert!(matches!(
            store.insert_user(data).await.unwrap_err(),
            StoreError::DuplicateUser
        ));
    }
}
