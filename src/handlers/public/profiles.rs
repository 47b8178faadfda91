// handlers/public/profiles.rs - GET /api/profiles/:username

use axum::extract::{Path, State};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{PublicProfile, ViewContext};

/// GET /api/profiles/:username - Public profile with published articles
pub async fn show(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(username): Path<String>,
) -> ApiResult<PublicProfile> {
    let profile = state.profiles.by_username(&ctx, &username).await?;
    Ok(ApiResponse::success(profile))
}
