//! Pre-write validation rules
//!
//! Checks that need no storage access live here as pure functions; the
//! uniqueness and assignee checks that do need storage are run by the
//! service using these helpers for the messages.

use super::BoardError;
use crate::models::COLUMN_NAMES;

/// True if `title` is exactly a board column name, surrounding whitespace aside
pub fn is_reserved_title(title: &str) -> bool {
    let title = title.trim();
    COLUMN_NAMES.iter().any(|column| *column == title)
}

/// Trims a title and checks it is non-empty and not a column name
///
/// Returns the trimmed title, which is what gets stored and compared for
/// uniqueness.
pub fn validate_title(title: &str) -> Result<String, BoardError> {
    let trimmed = title.trim();

    if trimmed.is_empty() {
        return Err(BoardError::InvalidRequest("Task title is required".to_string()));
    }
    if is_reserved_title(trimmed) {
        return Err(BoardError::ReservedTitle(trimmed.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Normalizes an optional description: blank becomes `None`
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
