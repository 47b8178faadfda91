// handlers/public/articles.rs - Published listing and article pages

use axum::extract::{rejection::QueryRejection, Path, Query, State};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::ArticleWithAuthor;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ViewContext;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Page size; defaults to the configured page size and is capped by the filter max.
    pub limit: Option<i32>,
}

/// GET /api/articles - Published articles, newest first
pub async fn list(
    State(state): State<AppState>,
    ctx: ViewContext,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<ArticleWithAuthor>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let articles = state.articles.list_published(&ctx, query.limit).await?;
    Ok(ApiResponse::success(articles))
}

/// GET /api/articles/:id - Article page with rendered HTML
///
/// Drafts answer 404 to everyone but their author.
pub async fn show(
    State(state): State<AppState>,
    ctx: ViewContext,
    Path(id): Path<String>,
) -> ApiResult<ArticleWithAuthor> {
    let article = state.articles.detail(&ctx, &id).await?;
    Ok(ApiResponse::success(article))
}
