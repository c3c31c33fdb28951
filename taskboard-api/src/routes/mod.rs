/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration and login
/// - `tasks`: Task CRUD, version-checked updates and smart assign
/// - `activity`: Recent audit entries
/// - `users`: User summaries
/// - `events`: Server-sent board events

pub mod activity;
pub mod auth;
pub mod events;
pub mod health;
pub mod tasks;
pub mod users;
