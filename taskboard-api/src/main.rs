//! # Taskboard API Server
//!
//! Serves the collaborative task board: version-checked task updates,
//! smart assignment, the activity feed, and a server-sent event stream that
//! pushes every accepted change to every connected client.
//!
//! ## Storage and fan-out
//!
//! - With `DATABASE_URL` set, tasks live in PostgreSQL (migrations run on
//!   startup); otherwise an in-memory store is used.
//! - With `REDIS_URL` set, events are also relayed between instances over
//!   Redis pub/sub.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p taskboard-api
//! ```

use std::sync::Arc;
use taskboard_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskboard_shared::{
    board::BoardService,
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    events::{BroadcastHub, Publisher},
    redis::{RedisClient, RedisConfig, RedisPublisher},
    store::Stores,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Taskboard API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let (stores, pool) = match &config.database {
        Some(database) => {
            let pool = create_pool(DatabaseConfig {
                url: database.url.clone(),
                max_connections: database.max_connections,
                ..Default::default()
            })
            .await?;
            run_migrations(&pool).await?;
            (Stores::postgres(pool.clone()), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            (Stores::memory(), None)
        }
    };

    let hub = BroadcastHub::new(config.broadcast.capacity);

    let (publisher, redis): (Arc<dyn Publisher>, Option<RedisClient>) =
        match &config.broadcast.redis_url {
            Some(url) => {
                let redis = RedisClient::new(RedisConfig::new(url.clone())).await?;
                let publisher = RedisPublisher::new(redis.clone(), hub.clone());
                publisher.spawn_relay();
                tracing::info!(origin = %publisher.origin(), "Redis event fan-out enabled");
                (Arc::new(publisher), Some(redis))
            }
            None => (Arc::new(hub.clone()), None),
        };

    let bind_address = config.bind_address();
    let board = BoardService::new(stores, publisher);

    let mut state = AppState::new(board, hub, config);
    if let Some(pool) = &pool {
        state = state.with_database(pool.clone());
    }
    if let Some(redis) = redis {
        state = state.with_redis(redis);
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
