/// Redis connection handling
///
/// A [`RedisClient`] owns a `ConnectionManager` for commands (it reconnects
/// on its own) plus the raw `redis::Client`, which is needed to open the
/// dedicated pub/sub connections the event relay listens on.

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error type for Redis operations
#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => RedisClientError::ConnectionError(err.to_string()),
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., "redis://localhost:6379")
    pub url: String,

    /// Timeout for single commands such as PING
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout_secs: 5,
        }
    }
}

/// Shared Redis client
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unparsable URL and `ConnectionError` if
    /// the server cannot be reached.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            client,
            manager,
            config: Arc::new(config),
        })
    }

    /// Connection for issuing commands
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Underlying client, for opening pub/sub connections
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sends PING and reports whether PONG came back in time
    pub async fn ping(&self) -> bool {
        let mut conn = self.manager.clone();

        let result: Result<Result<String, RedisError>, _> = tokio::time::timeout(
            Duration::from_secs(self.config.command_timeout_secs),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await;

        match result {
            Ok(Ok(pong)) => pong == "PONG",
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Redis health check failed");
                false
            }
            Err(_) => {
                tracing::warn!("Redis health check timed out");
                false
            }
        }
    }
}

/// Masks credentials in a Redis URL for logging
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
