/// Activity feed endpoint
///
/// ```text
/// GET /api/activity
/// ```
///
/// Returns the 20 newest audit entries, newest first, each with the acting
/// user's summary. `task_id` is `null` for entries about deleted tasks;
/// `task_title` always survives.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use taskboard_shared::models::ActionLogDetails;

pub async fn recent_activity(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ActionLogDetails>>> {
    Ok(Json(state.board.recent_activity().await?))
}
