// handlers/protected/profile.rs - PATCH /api/profile

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;

use crate::app::AppState;
use crate::database::models::{Profile, ProfilePatch};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ViewContext;

/// PATCH /api/profile - Update the viewer's display name, bio or avatar
pub async fn update(
    State(state): State<AppState>,
    ctx: ViewContext,
    payload: Result<Json<ProfilePatch>, JsonRejection>,
) -> ApiResult<Profile> {
    let Json(patch) = payload?;
    let profile = state.profiles.update_own(&ctx, patch).await?;
    Ok(ApiResponse::success(profile))
}
