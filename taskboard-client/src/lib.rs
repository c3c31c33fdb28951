//! # Taskboard Client
//!
//! Client side of the collaborative board: a local copy of the board that
//! shows edits immediately, reconciles them against the server's versions,
//! and follows the server's event stream.
//!
//! ## Modules
//!
//! - `api`: [`api::BoardApi`] and its HTTP implementation
//! - `reconcile`: Optimistic edits, conflicts, and their resolution
//! - `activity`: The recent-activity feed
//! - `session`: Ties the above together into a live session
//! - `config`: Environment configuration for the CLI
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskboard_client::{api::HttpBoardApi, session::Session};
//! use taskboard_shared::models::{TaskChanges, TaskStatus};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpBoardApi::login(
//!     "http://localhost:3000",
//!     "ada@example.com",
//!     "secret123",
//!     Duration::from_secs(30),
//! )
//! .await?;
//! let session = Session::new(Arc::new(api));
//! session.refresh().await?;
//!
//! if let Some(task) = session.tasks().await.first() {
//!     session
//!         .edit(task.id, TaskChanges::move_to(TaskStatus::Done))
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod api;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod session;

pub use error::{ClientError, ClientResult};
