pub mod auth;
pub mod response;

pub use auth::{resolve_viewer_middleware, BearerToken};
pub use response::{ApiResponse, ApiResult};
