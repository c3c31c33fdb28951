/// Persistence traits for the board
///
/// The board service never talks to a database directly. It is handed
/// implementations of these traits at construction time, so the same core
/// runs against PostgreSQL in production and an in-memory store in tests.
///
/// # Conditional updates
///
/// [`TaskStore::conditional_update`] is the single atomic compare-and-swap the
/// concurrency protocol relies on. Implementations must check the expected
/// version and write the new fields in one indivisible step (one SQL
/// statement, or one critical section), never as a read followed by a write.
///
/// # Example
///
/// ```
/// use taskboard_shared::store::Stores;
///
/// let stores = Stores::memory();
/// # let _ = stores;
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    ActionLogEntry, CreateTask, CreateUser, NewActionLogEntry, Task, TaskChanges, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The creator already has a task with this title
    #[error("duplicate task title: {0}")]
    DuplicateTitle(String),

    /// Username or email is already registered
    #[error("username or email already registered")]
    DuplicateUser,

    /// A stored row could not be decoded into a model
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable task records
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a task at version 0
    ///
    /// Fails with [`StoreError::DuplicateTitle`] if the creator already owns a
    /// task with the same title.
    async fn insert_task(&self, data: CreateTask) -> Result<Task, StoreError>;

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Tasks created by or assigned to `user_id`, newest first
    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// Whether `creator_id` owns a task titled exactly `title`, other than `exclude`
    async fn title_taken(
        &self,
        creator_id: Uuid,
        title: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError>;

    /// Applies `changes` only if the stored version equals `expected_version`
    ///
    /// On a match the changed fields are written, the version becomes
    /// `expected_version + 1`, and `updated_at` is refreshed, all atomically.
    /// Returns `Ok(None)` when the versions differ or the task does not exist;
    /// nothing is modified in that case.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError>;

    /// Removes a task entirely; returns false if it was already gone
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Number of Todo / In Progress tasks the user created or is assigned to
    async fn count_active_tasks(&self, user_id: Uuid) -> Result<i64, StoreError>;
}

/// Registered users
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, data: CreateUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Looks up a user by (already normalized) email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// All users in registration order
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

/// Append-only audit trail
#[async_trait]
pub trait ActionLogStore: Send + Sync {
    async fn append(&self, entry: NewActionLogEntry) -> Result<ActionLogEntry, StoreError>;

    /// The newest `limit` entries, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<ActionLogEntry>, StoreError>;
}

/// The three stores the board needs, usually backed by one implementation
#[derive(Clone)]
pub struct Stores {
    pub tasks: Arc<dyn TaskStore>,
    pub users: Arc<dyn UserStore>,
    pub logs: Arc<dyn ActionLogStore>,
}

impl Stores {
    /// Stores backed by a single in-memory store
    pub fn memory() -> Self {
        Self::from_shared(Arc::new(MemoryStore::new()))
    }

    /// Stores backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_shared(Arc::new(PgStore::new(pool)))
    }

    /// Uses one object for all three roles
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: TaskStore + UserStore + ActionLogStore + 'static,
    {
        Self {
            tasks: store.clone(),
            users: store.clone(),
            logs: store,
        }
    }
}
