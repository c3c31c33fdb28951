/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 3000)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, or `*` (default: `*`)
/// - `DATABASE_URL`: PostgreSQL connection string (optional; in-memory store when unset)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `JWT_EXPIRY_HOURS`: Token lifetime (default: 24)
/// - `BROADCAST_CAPACITY`: Per-subscriber event buffer (default: 256)
/// - `REDIS_URL`: Enables cross-instance event fan-out (optional)
/// - `RUST_LOG`: Log level (default: taskboard_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use taskboard_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}:{}", config.api.host, config.api.port);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration; `None` runs on the in-memory store
    pub database: Option<DatabaseConfig>,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Event broadcast configuration
    pub broadcast: BroadcastConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    /// Token lifetime in hours
    pub expiry_hours: i64,
}

/// Event broadcast configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Events buffered per subscriber before it starts lagging
    pub capacity: usize,

    /// Redis URL for fan-out across instances
    pub redis_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port: u16 = parse_or(&lookup, "API_PORT", 3000)?;

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(origins) if origins.trim() != "*" => origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let database = match lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            None => None,
        };

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let expiry_hours: i64 = parse_or(&lookup, "JWT_EXPIRY_HOURS", 24)?;
        if expiry_hours <= 0 {
            anyhow::bail!("JWT_EXPIRY_HOURS must be positive");
        }

        let capacity: usize = parse_or(&lookup, "BROADCAST_CAPACITY", 256)?;
        if capacity == 0 {
            anyhow::bail!("BROADCAST_CAPACITY must be at least 1");
        }

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database,
            jwt: JwtConfig {
                secret: jwt_secret,
                expiry_hours,
            },
            broadcast: BroadcastConfig {
                capacity,
                redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", SECRET)])).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(config.database.is_none());
        assert!(config.api.cors_origins.is_empty());
        assert_eq!(config.jwt.expiry_hours, 24);
        assert_eq!(config.broadcast.capacity, 256);
        assert!(config.broadcast.redis_url.is_none());
    }

    #[test]
    fn test_database_and_redis() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgresql://localhost/taskboard"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("CORS_ORIGINS", "http://localhost:5173, https://board.example.com"),
        ]))
        .unwrap();

        let database = config.database.unwrap();
        assert_eq!(database.max_connections, 4);
        assert_eq!(
            config.api.cors_origins,
            vec!["http://localhost:5173", "https://board.example.com"]
        );
        assert_eq!(
            config.broadcast.redis_url.as_deref(),
            Some("redis://localhost:6379")
        );
    }

    #[test]
    fn test_secret_required_and_long_enough() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "short")])).is_err());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", SECRET), ("API_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("API_PORT"));

        assert!(Config::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("BROADCAST_CAPACITY", "0")
        ]))
        .is_err());
    }
}
