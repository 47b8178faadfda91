use serde::{Deserialize, Serialize};

use super::{AuthError, AuthProvider, PendingConfirmation, ProfileHints, Session};
use crate::policy::{ValidationFailure, DASHBOARD_PATH};

pub const MIN_PASSWORD_LEN: usize = 6;
const FALLBACK_USERNAME: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    SignIn,
    SignUp,
}

/// Credentials as typed by the user. The mode is toggled, never persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthForm {
    #[serde(skip)]
    mode: Option<AuthMode>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSubmission {
    SignIn { email: String, password: String },
    SignUp { email: String, password: String, username: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    Authenticated { session: Session, redirect: String },
    CheckEmail { pending: PendingConfirmation, message: String },
}

impl AuthForm {
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode: Some(mode),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = email.into();
        self.password = password.into();
        self
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    /// Re-tag a deserialized body with the mode of the route it arrived on.
    pub fn in_mode(mut self, mode: AuthMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.mode.unwrap_or(AuthMode::SignIn)
    }

    pub fn toggle(&mut self) {
        self.mode = Some(match self.mode() {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        });
    }

    pub fn submit(&self) -> Result<AuthSubmission, ValidationFailure> {
        let mut failure = ValidationFailure::new("Please check the highlighted fields");
        let email = self.email.trim().to_string();
        let mode = self.mode();

        if email.is_empty() {
            failure.add("email", "Email is required");
        } else if !email.contains('@') {
            failure.add("email", "Email must contain '@'");
        }

        if self.password.is_empty() {
            failure.add("password", "Password is required");
        } else if mode == AuthMode::SignUp && self.password.chars().count() < MIN_PASSWORD_LEN {
            failure.add(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            );
        }

        let username = self.username.as_deref().map(str::trim).filter(|u| !u.is_empty());
        if mode == AuthMode::SignUp {
            if let Some(name) = username {
                if !is_valid_username(name) {
                    failure.add("username", "Username may only contain letters, digits, '_' and '-'");
                }
            }
        }

        failure.into_result()?;

        Ok(match mode {
            AuthMode::SignIn => AuthSubmission::SignIn {
                email,
                password: self.password.clone(),
            },
            AuthMode::SignUp => AuthSubmission::SignUp {
                username: resolve_username(username, &email),
                email,
                password: self.password.clone(),
            },
        })
    }
}

impl AuthSubmission {
    /// Hand the submission to the provider; errors carry its message verbatim.
    pub async fn perform(self, provider: &dyn AuthProvider) -> Result<AuthOutcome, AuthError> {
        match self {
            AuthSubmission::SignIn { email, password } => {
                let session = provider.sign_in(&email, &password).await?;
                Ok(AuthOutcome::Authenticated {
                    session,
                    redirect: DASHBOARD_PATH.to_string(),
                })
            }
            AuthSubmission::SignUp { email, password, username } => {
                let hints = ProfileHints { username: Some(username) };
                let pending = provider.sign_up(&email, &password, hints).await?;
                Ok(AuthOutcome::CheckEmail {
                    pending,
                    message: "Check your email to confirm your account".to_string(),
                })
            }
        }
    }
}

pub fn is_valid_username(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The hinted username, or the email's local part when the hint is blank.
/// Characters a username may not contain become `_` in the fallback.
pub fn resolve_username(hint: Option<&str>, email: &str) -> String {
    if let Some(name) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        return name.to_string();
    }

    let local = email.trim().split('@').next().unwrap_or_default().to_lowercase();
    let name: String = local
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if name.is_empty() {
        FALLBACK_USERNAME.to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_switches_modes() {
        let mut form = AuthForm::new(AuthMode::SignIn);
        form.toggle();
        assert_eq!(form.mode(), AuthMode::SignUp);
        form.toggle();
        assert_eq!(form.mode(), AuthMode::SignIn);
    }

    #[test]
    fn blank_username_falls_back_to_email_local_part() {
        let form = AuthForm::new(AuthMode::SignUp)
            .with_credentials("alice@example.com", "secret1")
            .with_username(Some("   ".to_string()));
        match form.submit().unwrap() {
            AuthSubmission::SignUp { username, .. } => assert_eq!(username, "alice"),
            other => panic!("unexpected submission {:?}", other),
        }
    }

    #[test]
    fn fallback_username_from_dotted_email_is_itself_valid() {
        for (email, expected) in [
            ("john.doe@example.com", "john_doe"),
            ("a+b@example.com", "a_b"),
            ("@example.com", "user"),
        ] {
            let form = AuthForm::new(AuthMode::SignUp).with_credentials(email, "secret1");
            match form.submit().unwrap() {
                AuthSubmission::SignUp { username, .. } => {
                    assert_eq!(username, expected);
                    assert!(is_valid_username(&username));

                    // Sending the resolved name back as an explicit hint is accepted
                    let resent = AuthForm::new(AuthMode::SignUp)
                        .with_credentials(email, "secret1")
                        .with_username(Some(username.clone()));
                    assert!(resent.submit().is_ok());
                }
                other => panic!("unexpected submission {:?}", other),
            }
        }
    }

    #[test]
    fn short_password_only_matters_on_sign_up() {
        let sign_up = AuthForm::new(AuthMode::SignUp).with_credentials("a@b.c", "12345");
        let failure = sign_up.submit().unwrap_err();
        assert!(failure.field_errors.contains_key("password"));

        let sign_in = AuthForm::new(AuthMode::SignIn).with_credentials("a@b.c", "12345");
        assert!(sign_in.submit().is_ok());
    }

    #[test]
    fn missing_fields_are_reported_together() {
        let failure = AuthForm::new(AuthMode::SignIn).submit().unwrap_err();
        assert!(failure.field_errors.contains_key("email"));
        assert!(failure.field_errors.contains_key("password"));

        let bad_email = AuthForm::new(AuthMode::SignIn).with_credentials("nope", "secret1");
        assert!(bad_email.submit().unwrap_err().field_errors.contains_key("email"));
    }

    #[test]
    fn username_pattern_is_enforced() {
        let form = AuthForm::new(AuthMode::SignUp)
            .with_credentials("alice@example.com", "secret1")
            .with_username(Some("al ice!".to_string()));
        assert!(form.submit().unwrap_err().field_errors.contains_key("username"));

        assert!(is_valid_username("a_b-9"));
        assert!(!is_valid_username(""));
    }
}
