//! # Taskboard Shared Library
//!
//! Domain types, storage and the board core shared by the Taskboard API
//! server and client.
//!
//! ## Module Organization
//!
//! - `models`: Tasks, users and activity entries
//! - `store`: Storage traits with in-memory and PostgreSQL implementations
//! - `board`: Validation, version-checked updates, smart assignment and activity logging
//! - `events`: Board events, the publish capability and the in-process hub
//! - `redis`: Optional cross-instance event fan-out
//! - `auth`: Password hashing, JWTs and request authentication
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod board;
pub mod db;
pub mod events;
pub mod models;
pub mod redis;
pub mod store;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
