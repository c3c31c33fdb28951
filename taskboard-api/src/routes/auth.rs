/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Register new user
/// - `POST /api/auth/login` - Login and get a token
///
/// Both respond with the user summary and a bearer token for the other
/// `/api` routes.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{jwt, password},
    models::{normalize_email, CreateUser, User, UserSummary},
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name, unique across the board
    #[validate(length(min = 1, max = 50, message = "Username must be 1 to 50 characters"))]
    pub username: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (checked with `validate_password`)
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Register and login response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The authenticated user
    pub user: UserSummary,

    /// Bearer token
    pub token: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// {
///   "username": "ada",
///   "email": "ada@example.com",
///   "password": "secret1"
/// }
/// ```
///
/// # Response
///
/// `201 Created`
///
/// ```json
/// {
///   "user": {"id": "uuid", "username": "ada", "email": "ada@example.com"},
///   "token": "eyJ..."
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body, or username/email already registered
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let Json(req) = payload?;

    req.validate().map_err(validation_errors)?;

    password::validate_password(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message: e,
        }])
    })?;

    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = state
        .board
        .stores()
        .users
        .insert_user(CreateUser {
            username,
            email: normalize_email(&req.email),
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    let response = issue(&state, &user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "password": "secret1"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(req) = payload?;

    req.validate().map_err(validation_errors)?;

    let user = state
        .board
        .stores()
        .users
        .find_user_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    Ok(Json(issue(&state, &user)?))
}

fn issue(state: &AppState, user: &User) -> ApiResult<AuthResponse> {
    let claims = jwt::Claims::with_expiration(
        user.id,
        user.username.clone(),
        Duration::hours(state.config.jwt.expiry_hours),
    );
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    Ok(AuthResponse {
        user: user.summary(),
        token,
    })
}

fn validation_errors(e: validator::ValidationErrors) -> ApiError {
    let errors: Vec<ValidationErrorDetail> = e
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    ApiError::ValidationError(errors)
}
