use std::fmt;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::cli::config::EnvironmentConfig;

/// Thin HTTP client for the zenn-clone API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// A response envelope as the server sent it.
#[derive(Debug)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Value,
}

/// A `{ "success": false, ... }` envelope.
#[derive(Debug)]
pub struct RemoteError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub redirect: Option<String>,
    pub envelope: Value,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)?;
        if let Some(ref path) = self.redirect {
            write!(f, "\n→ {}", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

impl ApiReply {
    pub fn is_success(&self) -> bool {
        self.body.get("success").and_then(Value::as_bool).unwrap_or(false)
    }

    /// The `data` member of a success envelope, or the envelope's error.
    pub fn into_data(self) -> Result<Value, RemoteError> {
        if self.is_success() {
            return Ok(self.body.get("data").cloned().unwrap_or(Value::Null));
        }

        let error = self.body.get("error");
        let text = |key: &str| {
            error
                .and_then(|e| e.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Err(RemoteError {
            status: self.status,
            code: text("code").unwrap_or_else(|| self.status.as_u16().to_string()),
            message: text("message").unwrap_or_else(|| "Request failed".to_string()),
            redirect: self.body.get("redirect").and_then(Value::as_str).map(str::to_string),
            envelope: self.body,
        })
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token,
        })
    }

    pub fn from_config(config: &EnvironmentConfig) -> anyhow::Result<Self> {
        Self::new(config.server_url(), config.active_token().map(str::to_string))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<ApiReply> {
        self.send::<()>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> anyhow::Result<ApiReply> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> anyhow::Result<ApiReply> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> anyhow::Result<ApiReply> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    async fn send<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> anyhow::Result<ApiReply> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reach {}: {}", self.base_url, e))?;
        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or_else(|_| {
            serde_json::json!({
                "success": status.is_success(),
                "error": { "code": status.as_u16().to_string(), "message": text }
            })
        });
        Ok(ApiReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_envelope_becomes_remote_error() {
        let reply = ApiReply {
            status: StatusCode::FORBIDDEN,
            body: json!({
                "success": false,
                "error": { "code": "UNAUTHORIZED", "message": "You do not have access to this article" },
                "redirect": "/dashboard"
            }),
        };
        let err = reply.into_data().unwrap_err();
        assert_eq!(err.code, "UNAUTHORIZED");
        assert_eq!(err.redirect.as_deref(), Some("/dashboard"));
        assert!(err.to_string().ends_with("→ /dashboard"));
    }

    #[test]
    fn success_envelope_yields_data() {
        let reply = ApiReply {
            status: StatusCode::OK,
            body: json!({ "success": true, "data": { "id": 1 } }),
        };
        assert_eq!(reply.into_data().unwrap(), json!({ "id": 1 }));
    }
}
