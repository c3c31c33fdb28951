/// User listing for assignee pickers
///
/// ```text
/// GET /api/users
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use taskboard_shared::models::UserSummary;

/// All users in registration order, without credentials
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(state.board.list_users().await?))
}
