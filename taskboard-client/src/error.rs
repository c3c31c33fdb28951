/// Client error types
///
/// Transport failures, API rejections, and misuse of the local reconciliation
/// state all surface as [`ClientError`]. A version conflict is its own variant
/// because callers treat it as a normal outcome of concurrent editing rather
/// than a failure.

use reqwest::StatusCode;
use uuid::Uuid;

/// Error type for board client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection or protocol failure talking to the server
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the request
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    /// The request carried a stale version
    #[error("Version conflict: {message}")]
    Conflict { message: String },

    /// Missing, expired, or insufficient credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A response or event body could not be decoded
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The event stream ended or broke
    #[error("Event stream error: {0}")]
    Stream(String),

    /// The task is not on the local board
    #[error("Task {0} is not on the local board")]
    UnknownTask(Uuid),

    /// An edit for the task is already in flight or awaiting resolution
    #[error("Task {0} already has a pending edit")]
    EditPending(Uuid),

    /// Resolution was requested for a task without a conflict
    #[error("Task {0} has no conflict to resolve")]
    NoConflict(Uuid),

    /// The task was deleted while the conflict was open
    #[error("Task {0} no longer exists")]
    TaskGone(Uuid),
}

impl ClientError {
    /// Whether the server rejected the request for a stale version
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict { .. })
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
