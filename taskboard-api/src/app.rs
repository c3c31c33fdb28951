/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_api::{app::{build_router, AppState}, config::Config};
/// use taskboard_shared::board::BoardService;
/// use taskboard_shared::events::BroadcastHub;
/// use taskboard_shared::store::Stores;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let hub = BroadcastHub::new(config.broadcast.capacity);
/// let board = BoardService::new(Stores::memory(), Arc::new(hub.clone()));
/// let app = build_router(AppState::new(board, hub, config));
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskboard_shared::auth::middleware::authenticate;
use taskboard_shared::board::BoardService;
use taskboard_shared::events::BroadcastHub;
use taskboard_shared::redis::RedisClient;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Board operations
    pub board: Arc<BoardService>,

    /// Local event hub the SSE stream subscribes to
    pub hub: BroadcastHub,

    /// Application configuration
    pub config: Arc<Config>,

    /// Database pool, when running on PostgreSQL
    pub db: Option<PgPool>,

    /// Redis client, when cross-instance fan-out is enabled
    pub redis: Option<RedisClient>,
}

impl AppState {
    /// Creates new application state
    pub fn new(board: BoardService, hub: BroadcastHub, config: Config) -> Self {
        Self {
            board: Arc::new(board),
            hub,
            config: Arc::new(config),
            db: None,
            redis: None,
        }
    }

    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    pub fn with_redis(mut self, redis: RedisClient) -> Self {
        self.redis = Some(redis);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /api/
///     ├── /auth/                       # Authentication (public)
///     │   ├── POST /register
///     │   └── POST /login
///     ├── /tasks                       # Board (authenticated)
///     │   ├── GET    /
///     │   ├── POST   /
///     │   ├── GET    /:id
///     │   ├── PUT    /:id
///     │   ├── DELETE /:id
///     │   └── PUT    /:id/smart-assign
///     ├── GET /activity                # 20 newest audit entries
///     ├── GET /users                   # User summaries
///     └── GET /events                  # Server-sent board events
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    // Board routes (require JWT authentication)
    let board_routes = Router::new()
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/tasks/:id/smart-assign", put(routes::tasks::smart_assign))
        .route("/activity", get(routes::activity::recent_activity))
        .route("/users", get(routes::users::list_users))
        .route("/events", get(routes::events::stream_events))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(board_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}

/// CORS from configuration: no origins configured means any origin
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.is_empty() {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects the resulting `AuthContext` into
/// request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
