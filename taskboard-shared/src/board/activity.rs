/// Activity logging
///
/// Every accepted mutation gets one human-readable audit entry. Logging runs
/// after the mutation has committed and can never undo it: if the entry
/// cannot be stored the failure is reported through `tracing` and otherwise
/// ignored.
///
/// # Descriptions
///
/// ```text
/// ada created task "Fix login"
/// ada updated task "Fix login" (status changed from Todo to Done) (assigned to grace)
/// ada deleted task "Fix login"
/// ada smart-assigned task "Fix login" to grace
/// ```

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::Actor;
use crate::events::{BoardEvent, Publisher};
use crate::models::{
    ActionKind, ActionLogDetails, ActionLogEntry, NewActionLogEntry, Task, UserSummary,
};
use crate::store::{ActionLogStore, StoreError, UserStore};

pub fn describe_created(actor: &Actor, title: &str) -> String {
    format!("{} created task \"{}\"", actor.username, title)
}

pub fn describe_deleted(actor: &Actor, title: &str) -> String {
    format!("{} deleted task \"{}\"", actor.username, title)
}

pub fn describe_smart_assign(actor: &Actor, title: &str, assignee: &str) -> String {
    format!(
        "{} smart-assigned task \"{}\" to {}",
        actor.username, title, assignee
    )
}

/// Describes an update, mentioning status and assignee only if they changed
///
/// `assignee_name` is the new assignee's username; it is only consulted when
/// the assignee actually changed to someone.
pub fn describe_update(
    actor: &Actor,
    before: &Task,
    after: &Task,
    assignee_name: Option<&str>,
) -> String {
    let mut description = format!("{} updated task \"{}\"", actor.username, after.title);

    if before.status != after.status {
        description.push_str(&format!(
            " (status changed from {} to {})",
            before.status, after.status
        ));
    }

    if before.assignee_id != after.assignee_id {
        match (after.assignee_id, assignee_name) {
            (Some(_), Some(name)) => description.push_str(&format!(" (assigned to {})", name)),
            (Some(id), None) => description.push_str(&format!(" (assigned to {})", id)),
            (None, _) => description.push_str(" (unassigned)"),
        }
    }

    description
}

/// Classifies an update by what changed
///
/// A change to the status alone is a `status_change` and a change to the
/// priority alone is a `priority_change`; anything else is `updated`.
pub fn kind_for_update(before: &Task, after: &Task) -> ActionKind {
    let status = before.status != after.status;
    let priority = before.priority != after.priority;
    let other = before.title != after.title
        || before.description != after.description
        || before.assignee_id != after.assignee_id;

    match (status, priority, other) {
        (true, false, false) => ActionKind::StatusChange,
        (false, true, false) => ActionKind::PriorityChange,
        _ => ActionKind::Updated,
    }
}

/// Records audit entries and announces them
#[derive(Clone)]
pub struct ActivityLogger {
    logs: Arc<dyn ActionLogStore>,
    users: Arc<dyn UserStore>,
    publisher: Arc<dyn Publisher>,
}

impl ActivityLogger {
    pub fn new(
        logs: Arc<dyn ActionLogStore>,
        users: Arc<dyn UserStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            logs,
            users,
            publisher,
        }
    }

    /// Appends an entry and broadcasts it as `newActionLogged`
    ///
    /// Never fails; storage and publish errors are logged and swallowed.
    pub async fn record(&self, actor: &Actor, entry: NewActionLogEntry) {
        let action = entry.action;
        let stored = match self.logs.append(entry).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %actor.user_id,
                    action = %action,
                    "Failed to record activity"
                );
                return;
            }
        };

        let user = match self.users.find_user(actor.user_id).await {
            Ok(user) => user.map(|u| u.summary()),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %actor.user_id, "Failed to resolve activity user");
                None
            }
        };

        let details = ActionLogDetails {
            entry: stored,
            user,
        };
        if let Err(e) = self
            .publisher
            .publish(BoardEvent::NewActionLogged(details))
            .await
        {
            tracing::warn!(error = %e, "Failed to broadcast activity entry");
        }
    }

    /// The newest `limit` entries with their acting users resolved
    pub async fn recent(&self, limit: usize) -> Result<Vec<ActionLogDetails>, StoreError> {
        let entries = self.logs.recent(limit).await?;
        let summaries = self.resolve_users(&entries).await?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let user = summaries.get(&entry.user_id).cloned();
                ActionLogDetails { entry, user }
            })
            .collect())
    }

    async fn resolve_users(
        &self,
        entries: &[ActionLogEntry],
    ) -> Result<HashMap<Uuid, UserSummary>, StoreError> {
        let mut summaries = HashMap::new();
        for entry in entries {
            if summaries.contains_key(&entry.user_id) {
                continue;
            }
            if let Some(user) = self.users.find_user(entry.user_id).await? {
                summaries.insert(user.id, user.summary());
            }
        }
        Ok(summaries)
    }
}
