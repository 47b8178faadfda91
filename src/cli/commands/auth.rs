use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::{json, Value};

use crate::auth::{AuthForm, AuthMode, AuthSubmission};
use crate::cli::client::ApiClient;
use crate::cli::config::{load_environment_config, save_environment_config};
use crate::cli::utils::{output_reply, output_success, resolve_password, str_field};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Register a new account")]
    Signup {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Username (defaults to the email's local part)")]
        username: Option<String>,
        #[arg(long, help = "Password (read from ZENN_PASSWORD or stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Sign in and store the session token")]
    Signin {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (read from ZENN_PASSWORD or stdin if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Confirm an email address with its one-time token")]
    Confirm {
        #[arg(help = "Confirmation token")]
        token: String,
    },

    #[command(about = "Revoke the stored session token")]
    Signout,

    #[command(about = "Show the signed-in user and profile")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Signup { email, username, password } => {
            let password = resolve_password(password)?;
            let form = AuthForm::new(AuthMode::SignUp)
                .with_credentials(email, password)
                .with_username(username);
            signup(form, &output_format).await
        }
        AuthCommands::Signin { email, password } => {
            let password = resolve_password(password)?;
            let form = AuthForm::new(AuthMode::SignIn).with_credentials(email, password);
            signin(form, &output_format).await
        }
        AuthCommands::Confirm { token } => {
            let client = ApiClient::from_config(&load_environment_config()?)?;
            let reply = client.post("/auth/confirm", &json!({ "token": token })).await?;
            output_reply(&output_format, reply, |data| {
                println!("✓ {}", str_field(data, "message"));
                println!("→ {}", str_field(data, "redirect"));
                Ok(())
            })
        }
        AuthCommands::Signout => signout(&output_format).await,
        AuthCommands::Whoami => {
            let client = ApiClient::from_config(&load_environment_config()?)?;
            let reply = client.get("/api/auth/whoami").await?;
            output_reply(&output_format, reply, |data| {
                let user = data.get("user").cloned().unwrap_or(Value::Null);
                let profile = data.get("profile").cloned().unwrap_or(Value::Null);
                println!("{} <{}>", str_field(&profile, "username"), str_field(&user, "email"));
                println!("id:           {}", str_field(&user, "id"));
                if let Some(name) = profile.get("display_name").and_then(Value::as_str) {
                    println!("display name: {}", name);
                }
                if let Some(bio) = profile.get("bio").and_then(Value::as_str) {
                    println!("bio:          {}", bio);
                }
                Ok(())
            })
        }
    }
}

/// Validate locally first so obvious mistakes never reach the server.
fn submission_body(form: &AuthForm) -> anyhow::Result<Value> {
    let submission = form.submit().map_err(|failure| {
        let mut lines = vec![failure.message.clone()];
        let mut fields: Vec<_> = failure.field_errors.iter().collect();
        fields.sort();
        lines.extend(fields.into_iter().map(|(field, message)| format!("  {}: {}", field, message)));
        anyhow::anyhow!(lines.join("\n"))
    })?;

    Ok(match submission {
        AuthSubmission::SignIn { email, password } => json!({ "email": email, "password": password }),
        AuthSubmission::SignUp { email, password, username } => {
            json!({ "email": email, "password": password, "username": username })
        }
    })
}

async fn signup(form: AuthForm, output_format: &OutputFormat) -> anyhow::Result<()> {
    let body = submission_body(&form)?;
    let client = ApiClient::from_config(&load_environment_config()?)?;
    let reply = client.post("/auth/signup", &body).await?;

    output_reply(output_format, reply, |data| {
        let pending = data.get("pending").cloned().unwrap_or(Value::Null);
        println!("✓ {}", str_field(data, "message"));
        println!("  username: {}", str_field(&pending, "username"));
        if let Some(token) = pending.get("confirmation_token").and_then(Value::as_str) {
            println!("  confirm with: zenn auth confirm {}", token);
        }
        Ok(())
    })
}

async fn signin(form: AuthForm, output_format: &OutputFormat) -> anyhow::Result<()> {
    let body = submission_body(&form)?;
    let mut config = load_environment_config()?;
    let client = ApiClient::new(config.server_url(), None)?;
    let reply = client.post("/auth/signin", &body).await?;

    if reply.is_success() {
        let data = reply.body.get("data").cloned().unwrap_or(Value::Null);
        let session = data.get("session").cloned().unwrap_or(Value::Null);
        let token = session
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Server response did not include an access token"))?;

        config.token = Some(token.to_string());
        config.token_expires_at = session
            .get("expires_at")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());
        config.current_user = session
            .get("user")
            .map(|user| str_field(user, "email").to_string());
        save_environment_config(&config)?;
    }

    output_reply(output_format, reply, |data| {
        let email = data
            .get("session")
            .and_then(|s| s.get("user"))
            .map(|user| str_field(user, "email"))
            .unwrap_or_default();
        println!("✓ Signed in as {}", email);
        println!("→ {}", str_field(data, "redirect"));
        Ok(())
    })
}

async fn signout(output_format: &OutputFormat) -> anyhow::Result<()> {
    let mut config = load_environment_config()?;
    if config.token.is_none() {
        return output_success(output_format, "Not signed in", None);
    }

    let client = ApiClient::from_config(&config)?;
    let reply = client.post("/api/auth/signout", &json!({})).await?;

    // The local session is dropped whatever the server says
    config.clear_session();
    save_environment_config(&config)?;

    output_reply(output_format, reply, |data| {
        println!("✓ Signed out");
        println!("→ {}", str_field(data, "redirect"));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_body_fills_username_from_email() {
        let form = AuthForm::new(AuthMode::SignUp).with_credentials("Alice@Example.com", "secret1");
        let body = submission_body(&form).unwrap();
        assert_eq!(body["username"], "alice");
    }

    #[test]
    fn dotted_email_body_passes_server_side_validation() {
        let form = AuthForm::new(AuthMode::SignUp).with_credentials("john.doe@example.com", "secret123");
        let body = submission_body(&form).unwrap();
        assert_eq!(body["username"], "john_doe");

        let received: AuthForm = serde_json::from_value(body).unwrap();
        match received.in_mode(AuthMode::SignUp).submit().unwrap() {
            AuthSubmission::SignUp { username, .. } => assert_eq!(username, "john_doe"),
            other => panic!("unexpected submission {:?}", other),
        }
    }

    #[test]
    fn invalid_forms_never_build_a_body() {
        let form = AuthForm::new(AuthMode::SignUp).with_credentials("nobody", "123");
        let err = submission_body(&form).unwrap_err().to_string();
        assert!(err.contains("email:"));
        assert!(err.contains("password:"));
    }
}
