pub mod articles;
pub mod context;
pub mod profiles;

use thiserror::Error;

use crate::auth::AuthError;
use crate::database::DatabaseError;
use crate::policy::{Denial, Rejection, ValidationFailure};

pub use articles::ArticleService;
pub use context::ViewContext;
pub use profiles::{ProfileService, PublicProfile};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Denied(#[from] Denial),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Request cancelled")]
    Cancelled,
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Denied(denial) => ServiceError::Denied(denial),
            Rejection::Invalid(failure) => ServiceError::Validation(failure),
        }
    }
}
