/// Configuration for the board client
///
/// # Environment Variables
///
/// - `TASKBOARD_URL`: Server base URL (default: http://localhost:3000)
/// - `TASKBOARD_EMAIL`: Login email (required)
/// - `TASKBOARD_PASSWORD`: Login password (required)
/// - `TASKBOARD_TIMEOUT_SECS`: Per-request timeout (default: 30)
/// - `TASKBOARD_RECONNECT_SECS`: Delay before reopening the event stream (default: 2)

use std::env;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, without a trailing slash
    pub base_url: String,

    pub email: String,

    pub password: String,

    /// Timeout for regular requests (not the event stream)
    pub request_timeout: Duration,

    /// Wait between event stream reconnects
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    /// Loads configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("TASKBOARD_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let email = lookup("TASKBOARD_EMAIL")
            .ok_or_else(|| anyhow::anyhow!("TASKBOARD_EMAIL environment variable is required"))?;
        let password = lookup("TASKBOARD_PASSWORD").ok_or_else(|| {
            anyhow::anyhow!("TASKBOARD_PASSWORD environment variable is required")
        })?;

        let request_timeout = secs_or(&lookup, "TASKBOARD_TIMEOUT_SECS", 30)?;
        let reconnect_delay = secs_or(&lookup, "TASKBOARD_RECONNECT_SECS", 2)?;

        Ok(Self {
            base_url,
            email,
            password,
            request_timeout,
            reconnect_delay,
        })
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: u64) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", key, raw, e))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}
