use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::policy::Viewer;
use crate::services::ViewContext;

/// Raw bearer token of the current request, kept for sign-out.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

/// Resolve the optional `Authorization: Bearer` header into a [`Viewer`].
///
/// Never rejects: a missing, malformed, expired or signed-out token leaves
/// the request anonymous, and the policy decides what anonymous may do.
pub async fn resolve_viewer_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_bearer_from_headers(request.headers());

    let viewer = match token {
        Some(ref token) => match state.auth.current_user(token).await {
            Ok(identity) => Viewer::from(identity),
            Err(e) => {
                tracing::debug!("Treating request as anonymous: {}", e);
                Viewer::Anonymous
            }
        },
        None => Viewer::Anonymous,
    };

    request.extensions_mut().insert(viewer);
    if let Some(token) = token {
        request.extensions_mut().insert(BearerToken(token));
    }

    next.run(request).await
}

fn extract_bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
        _ => {
            tracing::debug!("Ignoring Authorization header without a Bearer token");
            None
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ViewContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let viewer = parts.extensions.get::<Viewer>().cloned().unwrap_or_default();
        let token = parts.extensions.get::<BearerToken>().map(|t| t.0.clone());
        Ok(ViewContext::new(viewer, token, &state.shutdown))
    }
}
