/// Recent activity, as shown next to the board
///
/// Seeded from `GET /api/activity` and kept current from `newActionLogged`
/// events. Holds at most [`RECENT_ACTIVITY_LIMIT`] entries, newest first.

use taskboard_shared::models::{ActionLogDetails, RECENT_ACTIVITY_LIMIT};

#[derive(Debug, Default)]
pub struct ActivityFeed {
    entries: Vec<ActionLogDetails>,
}

impl ActivityFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the feed with a fresh fetch (already newest first)
    pub fn replace(&mut self, mut entries: Vec<ActionLogDetails>) {
        entries.truncate(RECENT_ACTIVITY_LIMIT);
        self.entries = entries;
    }

    /// Prepends a newly logged entry; returns false if it was already shown
    pub fn push(&mut self, entry: ActionLogDetails) -> bool {
        if self.entries.iter().any(|e| e.entry.id == entry.entry.id) {
            return false;
        }

        self.entries.insert(0, entry);
        self.entries.truncate(RECENT_ACTIVITY_LIMIT);
        true
    }

    pub fn entries(&self) -> &[ActionLogDetails] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
