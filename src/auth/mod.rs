pub mod form;
pub mod local;
pub mod token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::database::DatabaseError;

pub use form::{AuthForm, AuthMode, AuthOutcome, AuthSubmission};
pub use local::LocalAuthProvider;
pub use token::{Claims, TokenIssuer};

/// Who a session belongs to. `id` is also the owning profile's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileHints {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    /// Only present when sign-ups are auto-confirmed (local development).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut(Uuid),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("User already registered")]
    UserAlreadyRegistered,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid or expired confirmation token")]
    InvalidConfirmation,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Session has been signed out")]
    Revoked,

    #[error("Token error: {0}")]
    Token(String),

    #[error("Password hashing error: {0}")]
    Hash(String),

    #[error("Auth configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl AuthError {
    /// Errors whose message is meant to be shown to the user as-is.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::EmailNotConfirmed
                | AuthError::UserAlreadyRegistered
                | AuthError::UsernameTaken
                | AuthError::InvalidConfirmation
        )
    }

    pub fn is_session_failure(&self) -> bool {
        matches!(self, AuthError::InvalidToken(_) | AuthError::Revoked)
    }
}

/// Session issuance, credential checks and sign-out.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer token to its identity.
    async fn current_user(&self, token: &str) -> Result<Option<Identity>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_up(&self, email: &str, password: &str, hints: ProfileHints) -> Result<PendingConfirmation, AuthError>;

    async fn confirm(&self, token: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Write one audit line per session change until `shutdown` fires.
pub fn spawn_audit_log(mut events: broadcast::Receiver<SessionEvent>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(SessionEvent::SignedIn(identity)) => {
                        tracing::info!(target: "audit", user_id = %identity.id, email = %identity.email, "signed in");
                    }
                    Ok(SessionEvent::SignedOut(user_id)) => {
                        tracing::info!(target: "audit", user_id = %user_id, "signed out");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(target: "audit", "audit log lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}
