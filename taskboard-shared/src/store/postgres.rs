/// PostgreSQL store
///
/// Statuses, priorities and action kinds are stored as text and decoded
/// through private row types, so a bad value surfaces as
/// [`StoreError::Corrupt`] instead of a panic.
///
/// The conditional update is one statement:
///
/// ```sql
/// UPDATE tasks
/// SET <changed fields>, version = version + 1, updated_at = NOW()
/// WHERE id = $1 AND version = $2
/// RETURNING ...
/// ```
///
/// Zero returned rows means the caller's version was stale (or the task is
/// gone).
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskboard_shared::store::{PgStore, TaskStore};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// let load = store.count_active_tasks(Uuid::new_v4()).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ActionLogStore, StoreError, TaskStore, UserStore};
use crate::models::{
    ActionLogEntry, CreateTask, CreateUser, NewActionLogEntry, Task, TaskChanges, User,
};

const TASK_COLUMNS: &str = "id, title, description, status, priority, creator_id, assignee_id, \
                            version, created_at, updated_at";

const TASK_TITLE_CONSTRAINT: &str = "tasks_creator_title_unique";

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    creator_id: Uuid,
    assignee_id: Option<Uuid>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            priority: row.priority.parse().map_err(StoreError::Corrupt)?,
            creator_id: row.creator_id,
            assignee_id: row.assignee_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActionLogRow {
    id: Uuid,
    user_id: Uuid,
    action: String,
    task_id: Option<Uuid>,
    task_title: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActionLogRow> for ActionLogEntry {
    type Error = StoreError;

    fn try_from(row: ActionLogRow) -> Result<Self, Self::Error> {
        Ok(ActionLogEntry {
            id: row.id,
            user_id: row.user_id,
            action: row.action.parse().map_err(StoreError::Corrupt)?,
            task_id: row.task_id,
            task_title: row.task_title,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Maps a unique violation on the per-creator title constraint
fn title_conflict(err: sqlx::Error, title: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some(TASK_TITLE_CONSTRAINT) {
            return StoreError::DuplicateTitle(title.to_string());
        }
    }
    StoreError::Database(err)
}

/// PostgreSQL-backed implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, data: CreateTask) -> Result<Task, StoreError> {
        let query = format!(
            "INSERT INTO tasks (id, title, description, status, priority, creator_id, assignee_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            TASK_COLUMNS
        );

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(Uuid::new_v4())
            .bind(&data.title)
            .bind(&data.description)
            .bind(data.status.as_str())
            .bind(data.priority.as_str())
            .bind(data.creator_id)
            .bind(data.assignee_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| title_conflict(e, &data.title))?;

        row.try_into()
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let query = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let query = format!(
            "SELECT {} FROM tasks \
             WHERE creator_id = $1 OR assignee_id = $1 \
             ORDER BY created_at DESC, id DESC",
            TASK_COLUMNS
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn title_taken(
        &self,
        creator_id: Uuid,
        title: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM tasks
                WHERE creator_id = $1 AND title = $2
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(creator_id)
        .bind(title)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        changes: &TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let mut query = String::from("UPDATE tasks SET version = version + 1, updated_at = NOW()");
        let mut bind_count = 2;

        if changes.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if changes.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if changes.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if changes.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if changes.assignee_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", assignee_id = ${}", bind_count));
        }

        query.push_str(" WHERE id = $1 AND version = $2 RETURNING ");
        query.push_str(TASK_COLUMNS);

        let mut q = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .bind(expected_version);

        if let Some(title) = &changes.title {
            q = q.bind(title.clone());
        }
        if let Some(description) = &changes.description {
            q = q.bind(description.clone());
        }
        if let Some(status) = changes.status {
            q = q.bind(status.as_str());
        }
        if let Some(priority) = changes.priority {
            q = q.bind(priority.as_str());
        }
        if let Some(assignee_id) = changes.assignee_id {
            q = q.bind(assignee_id);
        }

        let row = q.fetch_optional(&self.pool).await.map_err(|e| {
            title_conflict(e, changes.title.as_deref().unwrap_or_default())
        })?;

        row.map(Task::try_from).transpose()
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_active_tasks(&self, user_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tasks
            WHERE (creator_id = $1 OR assignee_id = $1)
              AND status IN ('Todo', 'In Progress')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateUser)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[async_trait]
impl ActionLogStore for PgStore {
    async fn append(&self, entry: NewActionLogEntry) -> Result<ActionLogEntry, StoreError> {
        let row = sqlx::query_as::<_, ActionLogRow>(
            r#"
            INSERT INTO action_logs (id, user_id, action, task_id, task_title, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, action, task_id, task_title, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.task_id)
        .bind(&entry.task_title)
        .bind(&entry.description)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActionLogEntry>, StoreError> {
        let rows = sqlx::query_as::<_, ActionLogRow>(
            r#"
            SELECT id, user_id, action, task_id, task_title, description, created_at
            FROM action_logs
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActionLogEntry::try_from).collect()
    }
}
