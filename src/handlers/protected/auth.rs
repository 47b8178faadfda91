// handlers/protected/auth.rs - GET /api/auth/whoami, POST /api/auth/signout

use axum::extract::State;
use serde::Serialize;

use crate::app::AppState;
use crate::auth::Identity;
use crate::database::models::Profile;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::Denial;
use crate::services::ViewContext;

#[derive(Debug, Serialize)]
pub struct Whoami {
    pub user: Identity,
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct SignedOut {
    pub signed_out: bool,
    pub redirect: String,
}

/// GET /api/auth/whoami - Session identity and its profile
pub async fn whoami(State(state): State<AppState>, ctx: ViewContext) -> ApiResult<Whoami> {
    let user = ctx.viewer.require()?.clone();
    let profile = state.profiles.own(&ctx).await?;
    Ok(ApiResponse::success(Whoami { user, profile }))
}

/// POST /api/auth/signout - Revoke the current session token
pub async fn signout(State(state): State<AppState>, ctx: ViewContext) -> ApiResult<SignedOut> {
    ctx.viewer.require()?;
    let token = ctx.bearer_token().ok_or(Denial::Unauthenticated)?;
    state.auth.sign_out(token).await?;
    Ok(ApiResponse::success(SignedOut {
        signed_out: true,
        redirect: "/".to_string(),
    }))
}
