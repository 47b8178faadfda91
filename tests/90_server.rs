mod common;

use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn server_binary_serves_health_and_articles() -> Result<()> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(15)).await?;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(health["data"]["status"], "ok");
    assert_eq!(health["data"]["backend"], "memory");

    let listing = client.get(format!("{}/api/articles", server.base_url)).send().await?;
    assert_eq!(listing.status(), StatusCode::OK);
    let body: Value = listing.json().await?;
    assert_eq!(body["success"], true);
    assert!(body["data"].as_array().is_some());

    let create = client
        .post(format!("{}/api/articles", server.base_url))
        .json(&json!({ "title": "t", "content": "c" }))
        .send()
        .await?;
    assert_eq!(create.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        create.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("/auth")
    );
    Ok(())
}
