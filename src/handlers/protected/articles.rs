// handlers/protected/articles.rs - Create, edit and preview articles

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::database::models::{Article, ArticleInput};
use crate::markdown;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::DASHBOARD_PATH;
use crate::services::ViewContext;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Preview {
    pub html: String,
}

/// POST /api/articles - Create a draft or published article owned by the viewer
pub async fn create(
    State(state): State<AppState>,
    ctx: ViewContext,
    payload: Result<Json<ArticleInput>, JsonRejection>,
) -> ApiResult<Article> {
    let Json(input) = payload?;
    let article = state.articles.create(&ctx, input).await?;
    Ok(ApiResponse::created(article).redirect_to(DASHBOARD_PATH))
}

/// GET /api/articles/:id/edit - Current values for the editor (author only)
pub async fn edit_form(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<String>,
) -> ApiResult<Article> {
    let article = state.articles.edit_form(&ctx, &id).await?;
    Ok(ApiResponse::success(article))
}

/// PUT /api/articles/:id - Save title, content and publish state (author only)
pub async fn update(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<String>,
    payload: Result<Json<ArticleInput>, JsonRejection>,
) -> ApiResult<Article> {
    let Json(input) = payload?;
    let article = state.articles.update(&ctx, &id, input).await?;
    Ok(ApiResponse::success(article).redirect_to(DASHBOARD_PATH))
}

/// POST /api/preview - Render Markdown without saving
pub async fn preview(ctx: ViewContext, payload: Result<Json<PreviewRequest>, JsonRejection>) -> ApiResult<Preview> {
    ctx.viewer.require()?;
    let Json(request) = payload?;
    Ok(ApiResponse::success(Preview {
        html: markdown::render(&request.content),
    }))
}
