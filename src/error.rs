// HTTP API Error Types
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::AuthError;
use crate::database::DatabaseError;
use crate::policy::{Denial, ValidationFailure, DASHBOARD_PATH, SIGN_IN_PATH};
use crate::services::ServiceError;

/// How long clients should keep an error notice on screen.
pub const NOTICE_DURATION_MS: u64 = 3000;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized, client should go to the sign-in page
    Unauthorized(String),

    // 403 Forbidden, client should go back to its dashboard
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity (validation but semantically valid JSON)
    UnprocessableEntity {
        message: String,
        field_errors: HashMap<String, String>,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (store rejected the request)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHENTICATED",
            ApiError::Forbidden(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Where the client should navigate instead of showing the error inline.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            ApiError::Unauthorized(_) => Some(SIGN_IN_PATH),
            ApiError::Forbidden(_) => Some(DASHBOARD_PATH),
            _ => None,
        }
    }

    fn field_errors(&self) -> Option<&HashMap<String, String>> {
        match self {
            ApiError::ValidationError { field_errors, .. } => field_errors.as_ref(),
            ApiError::UnprocessableEntity { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }

    /// Navigation outcomes carry no notice; everything else is shown as a toast.
    fn has_notice(&self) -> bool {
        !matches!(self, ApiError::Unauthorized(_) | ApiError::Forbidden(_) | ApiError::NotFound(_))
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "code": self.error_code(),
            "message": self.message(),
        });
        if let Some(field_errors) = self.field_errors() {
            error["field_errors"] = json!(field_errors);
        }

        let mut response = json!({
            "success": false,
            "error": error,
        });
        if let Some(path) = self.redirect() {
            response["redirect"] = json!(path);
        }
        if self.has_notice() {
            response["notice"] = json!({
                "kind": "error",
                "message": self.message(),
                "duration_ms": NOTICE_DURATION_MS,
            });
        }
        response
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unprocessable_entity(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        ApiError::UnprocessableEntity {
            message: message.into(),
            field_errors,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => ApiError::unauthorized(denial.to_string()),
            Denial::Unauthorized => ApiError::forbidden(denial.to_string()),
            Denial::NotFound => ApiError::not_found(denial.to_string()),
        }
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(failure: ValidationFailure) -> Self {
        if failure.field_errors.is_empty() {
            ApiError::validation_error(failure.message, None)
        } else {
            ApiError::unprocessable_entity(failure.message, failure.field_errors)
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_rejection() {
            // Provider messages are shown to the user verbatim
            return ApiError::bad_request(err.to_string());
        }
        match err {
            e if e.is_session_failure() => ApiError::unauthorized(e.to_string()),
            AuthError::Database(db) => db.into(),
            other => {
                tracing::error!("Auth provider error: {}", other);
                ApiError::internal_server_error("Authentication service error")
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            e @ (DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl) => {
                tracing::error!("Database misconfigured: {}", e);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            e @ (DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::Io(_))) => {
                tracing::error!("Database connection error: {}", e);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::bad_gateway("Data store request failed")
            }
            DatabaseError::QueryError(msg) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", msg);
                ApiError::bad_gateway("Data store request failed")
            }
            DatabaseError::Decode(e) => {
                tracing::error!("Row decoding error: {}", e);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Filter(e) => ApiError::bad_request(e.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Denied(denial) => denial.into(),
            ServiceError::Validation(failure) => failure.into(),
            ServiceError::Auth(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::Cancelled => ApiError::service_unavailable("Request cancelled"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.to_json())).into_response();
        if let Some(path) = self.redirect() {
            response
                .headers_mut()
                .insert(header::LOCATION, HeaderValue::from_static(path));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_map_to_status_and_redirect() {
        let unauthenticated = ApiError::from(Denial::Unauthenticated);
        assert_eq!(unauthenticated.status_code(), 401);
        assert_eq!(unauthenticated.to_json()["redirect"], "/auth");

        let unauthorized = ApiError::from(Denial::Unauthorized);
        assert_eq!(unauthorized.status_code(), 403);
        assert_eq!(unauthorized.to_json()["redirect"], "/dashboard");
        assert!(unauthorized.to_json().get("notice").is_none());

        let missing = ApiError::from(Denial::NotFound);
        assert_eq!(missing.status_code(), 404);
        assert!(missing.to_json().get("redirect").is_none());
    }

    #[test]
    fn validation_failures_carry_field_errors_and_a_notice() {
        let failure = ValidationFailure::field("title", "Title is required");
        let body = ApiError::from(failure).to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");
        assert_eq!(body["error"]["field_errors"]["title"], "Title is required");
        assert_eq!(body["notice"]["kind"], "error");
        assert_eq!(body["notice"]["duration_ms"], NOTICE_DURATION_MS);
    }

    #[test]
    fn provider_rejections_keep_their_message() {
        let err = ApiError::from(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Invalid login credentials");

        let conflict = ApiError::from(DatabaseError::Conflict("dup".to_string()));
        assert_eq!(conflict.status_code(), 409);
    }

    #[test]
    fn location_header_follows_redirect() {
        let response = ApiError::from(Denial::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/dashboard");
    }
}
