// handlers/protected/dashboard.rs - GET /api/dashboard

use axum::extract::State;

use crate::app::AppState;
use crate::database::models::DashboardEntry;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ViewContext;

/// GET /api/dashboard - All of the viewer's articles, drafts included
pub async fn show(State(state): State<AppState>, ctx: ViewContext) -> ApiResult<Vec<DashboardEntry>> {
    let entries = state.articles.dashboard(&ctx).await?;
    Ok(ApiResponse::success(entries))
}
