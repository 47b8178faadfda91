mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn signup_without_username_uses_the_email_local_part() -> Result<()> {
    let app = TestApp::new()?;

    let res = app
        .post(
            "/auth/signup",
            None,
            json!({ "email": "alice@example.com", "password": "password123", "username": "" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["outcome"], "check_email");
    assert_eq!(res.data()["pending"]["username"], "alice");

    let profile = app.get("/api/profiles/alice", None).await?;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.data()["profile"]["display_name"], "alice");
    Ok(())
}

#[tokio::test]
async fn signin_requires_a_confirmed_email() -> Result<()> {
    let app = TestApp::new()?;
    let signup = app
        .post(
            "/auth/signup",
            None,
            json!({ "email": "carol@example.com", "password": "password123" }),
        )
        .await?;
    let token = signup.data()["pending"]["confirmation_token"].as_str().unwrap().to_string();

    let early = app
        .post("/auth/signin", None, json!({ "email": "carol@example.com", "password": "password123" }))
        .await?;
    assert_eq!(early.status, StatusCode::BAD_REQUEST);
    assert_eq!(early.body["error"]["message"], "Email not confirmed");

    let confirmed = app.post("/auth/confirm", None, json!({ "token": token })).await?;
    assert_eq!(confirmed.status, StatusCode::OK);
    assert_eq!(confirmed.data()["redirect"], "/auth");

    let reused = app.post("/auth/confirm", None, json!({ "token": token })).await?;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);

    let signin = app
        .post("/auth/signin", None, json!({ "email": "carol@example.com", "password": "password123" }))
        .await?;
    assert_eq!(signin.status, StatusCode::OK);
    assert_eq!(signin.data()["outcome"], "authenticated");
    assert_eq!(signin.data()["redirect"], "/dashboard");
    assert_eq!(signin.data()["session"]["token_type"], "bearer");
    Ok(())
}

#[tokio::test]
async fn bad_credentials_show_the_provider_message() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice@example.com", "alice").await?;

    let wrong = app
        .post("/auth/signin", None, json!({ "email": "alice@example.com", "password": "nope-nope" }))
        .await?;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.body["error"]["message"], "Invalid login credentials");
    assert_eq!(wrong.body["notice"]["duration_ms"], 3000);

    let unknown = app
        .post("/auth/signin", None, json!({ "email": "ghost@example.com", "password": "password123" }))
        .await?;
    assert_eq!(unknown.body["error"]["message"], "Invalid login credentials");

    let duplicate = app
        .post(
            "/auth/signup",
            None,
            json!({ "email": "alice@example.com", "password": "password123", "username": "alice2" }),
        )
        .await?;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["error"]["message"], "User already registered");
    Ok(())
}

#[tokio::test]
async fn form_validation_happens_before_the_provider() -> Result<()> {
    let app = TestApp::new()?;

    let res = app
        .post(
            "/auth/signup",
            None,
            json!({ "email": "no-at-sign", "password": "123", "username": "bad name!" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields = &res.body["error"]["field_errors"];
    assert!(fields["email"].is_string());
    assert!(fields["password"].is_string());
    assert!(fields["username"].is_string());
    Ok(())
}

#[tokio::test]
async fn signout_revokes_the_token() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.register("alice@example.com", "alice").await?;

    let whoami = app.get("/api/auth/whoami", Some(&token)).await?;
    assert_eq!(whoami.status, StatusCode::OK);
    assert_eq!(whoami.data()["profile"]["username"], "alice");

    let out = app.post("/api/auth/signout", Some(&token), json!({})).await?;
    assert_eq!(out.status, StatusCode::OK);
    assert_eq!(out.data()["redirect"], "/");

    let after = app.get("/api/auth/whoami", Some(&token)).await?;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.location(), Some("/auth"));

    // A fresh sign-in still works
    let again = app.signin("alice@example.com", "password123").await?;
    assert_ne!(again, token);
    Ok(())
}
