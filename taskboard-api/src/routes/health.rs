/// Health check endpoint
///
/// Reports whether the server is up and how its backing services are doing:
/// - Store: `memory`, or PostgreSQL `connected` / `disconnected`
/// - Broadcast: `local`, or Redis `connected` / `disconnected`
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "store": "connected",
///   "broadcast": "local",
///   "subscribers": 3
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::Serialize;
use taskboard_shared::db::pool::{get_pool_stats, health_check as database_health_check, PoolStats};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Store status
    pub store: String,

    /// Broadcast transport status
    pub broadcast: String,

    /// Open event streams on this instance
    pub subscribers: usize,

    /// Connection pool usage, when running on PostgreSQL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

/// Health check handler
///
/// `degraded` when PostgreSQL or Redis is configured but unreachable.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let store = match &state.db {
        Some(pool) => match database_health_check(pool).await {
            Ok(()) => "connected",
            Err(_) => "disconnected",
        },
        None => "memory",
    };

    let broadcast = match &state.redis {
        Some(redis) if redis.ping().await => "connected",
        Some(_) => "disconnected",
        None => "local",
    };

    let healthy = store != "disconnected" && broadcast != "disconnected";

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.to_string(),
        broadcast: broadcast.to_string(),
        subscribers: state.hub.subscriber_count(),
        pool: state.db.as_ref().map(get_pool_stats),
    }))
}
