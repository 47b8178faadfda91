use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Success envelope `{ "success": true, "data": ... }`, optionally telling
/// the client where to navigate next.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
    pub redirect: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
            redirect: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::success(data)
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// Attach a navigation hint; also sent as `Content-Location`.
    pub fn redirect_to(mut self, path: &'static str) -> Self {
        self.redirect = Some(path);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": {
                            "code": "INTERNAL_SERVER_ERROR",
                            "message": "Failed to serialize response data"
                        }
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = json!({ "success": true, "data": data });
        let Some(path) = self.redirect else {
            return (status, Json(envelope)).into_response();
        };

        envelope["redirect"] = json!(path);
        let mut response = (status, Json(envelope)).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_LOCATION, HeaderValue::from_static(path));
        response
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_hint_lands_in_body_and_header() {
        let response = ApiResponse::created(json!({ "id": 1 }))
            .redirect_to("/dashboard")
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::CONTENT_LOCATION).unwrap(),
            "/dashboard"
        );
    }
}
