// handlers/public/auth.rs - POST /auth/signup, /auth/signin, /auth/confirm

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::{AuthForm, AuthMode, AuthOutcome, Identity};
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::SIGN_IN_PATH;

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct Confirmed {
    pub user: Identity,
    pub message: String,
    pub redirect: String,
}

/// POST /auth/signup - Create an account; the answer is always "check your email"
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<AuthForm>, JsonRejection>,
) -> ApiResult<AuthOutcome> {
    let Json(form) = payload?;
    let submission = form.in_mode(AuthMode::SignUp).submit()?;
    let outcome = submission.perform(state.auth.as_ref()).await?;
    Ok(ApiResponse::created(outcome))
}

/// POST /auth/signin - Exchange credentials for a session token
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<AuthForm>, JsonRejection>,
) -> ApiResult<AuthOutcome> {
    let Json(form) = payload?;
    let submission = form.in_mode(AuthMode::SignIn).submit()?;
    let outcome = submission.perform(state.auth.as_ref()).await?;
    Ok(ApiResponse::success(outcome))
}

/// POST /auth/confirm - Confirm an email address with its one-time token
pub async fn confirm(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> ApiResult<Confirmed> {
    let Json(request) = payload?;
    let user = state.auth.confirm(&request.token).await?;
    Ok(ApiResponse::success(Confirmed {
        user,
        message: "Email confirmed, you can now sign in".to_string(),
        redirect: SIGN_IN_PATH.to_string(),
    }))
}
