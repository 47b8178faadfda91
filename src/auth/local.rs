use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::form::resolve_username;
use super::token::TokenIssuer;
use super::{AuthError, AuthProvider, Identity, PendingConfirmation, ProfileHints, Session, SessionEvent};
use crate::config::SecurityConfig;
use crate::database::models::{AuthUser, Profile};
use crate::database::{DatabaseError, Repository, Store, Table};
use crate::filter::FilterData;

const EVENT_CAPACITY: usize = 64;

/// Auth provider backed by the application's own store.
pub struct LocalAuthProvider {
    store: Arc<dyn Store>,
    users: Repository<AuthUser>,
    profiles: Repository<Profile>,
    tokens: TokenIssuer,
    auto_confirm: bool,
    // jti -> exp of signed-out tokens that have not expired yet
    revoked: RwLock<HashMap<Uuid, i64>>,
    events: broadcast::Sender<SessionEvent>,
}

impl LocalAuthProvider {
    pub fn new(store: Arc<dyn Store>, security: &SecurityConfig) -> Result<Self, AuthError> {
        let tokens = TokenIssuer::new(&security.jwt_secret, security.jwt_expiry_hours)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            users: Repository::new(Table::AuthUsers, store.clone()),
            profiles: Repository::new(Table::Profiles, store.clone()),
            store,
            tokens,
            auto_confirm: security.auto_confirm_signups,
            revoked: RwLock::new(HashMap::new()),
            events,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.users.select_one(FilterData::where_eq("email", email)).await?)
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn current_user(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        let claims = self.tokens.validate(token)?;
        if self.revoked.read().await.contains_key(&claims.jti) {
            return Err(AuthError::Revoked);
        }
        Ok(Some(claims.identity()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let user = match self.find_by_email(&email).await? {
            Some(user) => user,
            None => return Err(AuthError::InvalidCredentials),
        };

        if !verify_password(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_confirmed() {
            return Err(AuthError::EmailNotConfirmed);
        }

        self.users
            .update_id(user.id, json!({ "last_sign_in_at": Utc::now() }))
            .await?;

        let identity = Identity {
            id: user.id,
            email: user.email,
        };
        let (access_token, claims) = self.tokens.issue(&identity)?;
        self.publish(SessionEvent::SignedIn(identity.clone()));

        Ok(Session {
            access_token,
            token_type: "bearer".to_string(),
            expires_at: claims.expires_at(),
            user: identity,
        })
    }

    async fn sign_up(&self, email: &str, password: &str, hints: ProfileHints) -> Result<PendingConfirmation, AuthError> {
        let email = normalize_email(email);
        let username = resolve_username(hints.username.as_deref(), &email);
        let password_hash = hash_password(password).await?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyRegistered);
        }
        if self
            .profiles
            .select_one(FilterData::where_eq("username", username.as_str()))
            .await?
            .is_some()
        {
            return Err(AuthError::UsernameTaken);
        }

        let confirmation_token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash,
            confirmation_digest: Some(digest(&confirmation_token)),
            confirmed_at: None,
            last_sign_in_at: None,
            created_at: now,
        };
        let profile = Profile {
            id: user.id,
            username: username.clone(),
            display_name: Some(username.clone()),
            bio: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };

        // The account and its profile land together or not at all
        let rows = vec![
            (Table::AuthUsers, serde_json::to_value(&user).map_err(DatabaseError::from)?),
            (Table::Profiles, serde_json::to_value(&profile).map_err(DatabaseError::from)?),
        ];
        if let Err(err) = self.store.insert_all(rows).await {
            return Err(match err {
                // Lost a race after the checks above; report whichever key is now held
                DatabaseError::Conflict(_) if self.find_by_email(&email).await?.is_some() => {
                    AuthError::UserAlreadyRegistered
                }
                DatabaseError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Database(other),
            });
        }

        info!(user_id = %user.id, username = %username, "sign-up pending confirmation");
        // There is no mailer; outside auto-confirm the token only reaches the debug log
        debug!(user_id = %user.id, token = %confirmation_token, "confirmation token issued");

        Ok(PendingConfirmation {
            user_id: user.id,
            email,
            username,
            confirmation_token: self.auto_confirm.then_some(confirmation_token),
        })
    }

    async fn confirm(&self, token: &str) -> Result<Identity, AuthError> {
        let filter = FilterData::where_eq("confirmation_digest", digest(token.trim()));
        let user = match self.users.select_one(filter).await? {
            Some(user) => user,
            None => return Err(AuthError::InvalidConfirmation),
        };

        let user = self
            .users
            .update_id(
                user.id,
                json!({ "confirmed_at": Utc::now(), "confirmation_digest": null }),
            )
            .await?;
        info!(user_id = %user.id, "email confirmed");

        Ok(Identity {
            id: user.id,
            email: user.email,
        })
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.tokens.validate(token)?;
        let now = Utc::now().timestamp();

        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        if revoked.insert(claims.jti, claims.exp).is_some() {
            warn!(user_id = %claims.sub, "token signed out twice");
            return Err(AuthError::Revoked);
        }
        drop(revoked);

        self.publish(SessionEvent::SignedOut(claims.sub));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes()).map_err(|e| AuthError::Hash(e.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hash(e.to_string()))?
}

async fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let stored = stored.to_string();
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored).map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    })
    .await
    .map_err(|e| AuthError::Hash(e.to_string()))?
}
