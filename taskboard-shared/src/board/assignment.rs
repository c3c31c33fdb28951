/// Smart assignment
///
/// Picks the user carrying the fewest active (Todo or In Progress) tasks,
/// counting tasks they created as well as tasks assigned to them. Ties go
/// to the earliest-registered user, then to the lowest user ID, so the same
/// board state always yields the same choice.

use crate::models::User;
use crate::store::{StoreError, TaskStore, UserStore};

/// A user together with their current load
#[derive(Debug, Clone)]
pub struct Candidate {
    pub user: User,
    pub active_tasks: i64,
}

/// Counts active tasks for every registered user
pub async fn load_candidates(
    users: &dyn UserStore,
    tasks: &dyn TaskStore,
) -> Result<Vec<Candidate>, StoreError> {
    let mut candidates = Vec::new();
    for user in users.list_users().await? {
        let active_tasks = tasks.count_active_tasks(user.id).await?;
        candidates.push(Candidate { user, active_tasks });
    }
    Ok(candidates)
}

/// The least-loaded candidate, or `None` if there are none
pub fn pick_least_loaded(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .min_by_key(|c| (c.active_tasks, c.user.created_at, c.user.id))
}
