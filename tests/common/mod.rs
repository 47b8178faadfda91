#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use zenn_clone::app::{router, AppState};
use zenn_clone::config::AppConfig;

/// In-process server over a fresh `MemoryStore`.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let mut config = AppConfig::development();
        config.server.enable_request_logging = false;
        let state = AppState::in_memory(config)?;
        Ok(Self {
            router: router(state.clone()),
            state,
        })
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body was not JSON")?
        };
        Ok(TestResponse { status, headers, body })
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::PUT, path, token, Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::PATCH, path, token, Some(body)).await
    }

    /// Sign up, confirm and sign in; returns the access token.
    pub async fn register(&self, email: &str, username: &str) -> Result<String> {
        let signup = self
            .post(
                "/auth/signup",
                None,
                json!({ "email": email, "password": "password123", "username": username }),
            )
            .await?;
        anyhow::ensure!(signup.status == StatusCode::CREATED, "signup failed: {}", signup.body);

        let confirmation = signup.data()["pending"]["confirmation_token"]
            .as_str()
            .context("development sign-ups expose the confirmation token")?
            .to_string();
        let confirm = self.post("/auth/confirm", None, json!({ "token": confirmation })).await?;
        anyhow::ensure!(confirm.status == StatusCode::OK, "confirm failed: {}", confirm.body);

        self.signin(email, "password123").await
    }

    pub async fn signin(&self, email: &str, password: &str) -> Result<String> {
        let signin = self
            .post("/auth/signin", None, json!({ "email": email, "password": password }))
            .await?;
        anyhow::ensure!(signin.status == StatusCode::OK, "signin failed: {}", signin.body);
        signin.data()["session"]["access_token"]
            .as_str()
            .map(str::to_string)
            .context("signin response carries an access token")
    }

    /// Create an article and return its id.
    pub async fn write(&self, token: &str, title: &str, published: bool) -> Result<String> {
        let created = self
            .post(
                "/api/articles",
                Some(token),
                json!({ "title": title, "content": "# Heading\n\nBody text", "published": published }),
            )
            .await?;
        anyhow::ensure!(created.status == StatusCode::CREATED, "create failed: {}", created.body);
        created.data()["id"]
            .as_str()
            .map(str::to_string)
            .context("created article has an id")
    }
}

/// The server binary on its own port with in-memory storage.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    pub fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_zenn-clone"))
            .env("APP_ENV", "development")
            .env("ZENN_STORAGE", "memory")
            .env("ZENN_PORT", port.to_string())
            .env_remove("ZENN_CONFIG")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
