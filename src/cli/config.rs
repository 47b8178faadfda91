use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Persistent CLI state kept in `env.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub current_user: Option<String>,
}

impl EnvironmentConfig {
    pub fn server_url(&self) -> String {
        std::env::var("ZENN_SERVER_URL")
            .ok()
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Stored token, unless it is known to have expired.
    pub fn active_token(&self) -> Option<&str> {
        match self.token_expires_at {
            Some(expiry) if expiry <= Utc::now() => None,
            _ => self.token.as_deref(),
        }
    }

    pub fn clear_session(&mut self) {
        self.token = None;
        self.token_expires_at = None;
        self.current_user = None;
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("ZENN_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("zenn").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_environment_config() -> anyhow::Result<EnvironmentConfig> {
    let config_dir = get_config_dir()?;
    let env_file = config_dir.join("env.json");

    if !env_file.exists() {
        return Ok(EnvironmentConfig::default());
    }

    let content = fs::read_to_string(env_file)?;
    let config: EnvironmentConfig = serde_json::from_str(&content)?;
    Ok(config)
}

pub fn save_environment_config(config: &EnvironmentConfig) -> anyhow::Result<()> {
    let config_dir = get_config_dir()?;
    let env_file = config_dir.join("env.json");

    let content = serde_json::to_string_pretty(config)?;
    fs::write(env_file, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expired_tokens_are_not_used() {
        let mut config = EnvironmentConfig {
            token: Some("abc".to_string()),
            token_expires_at: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(config.active_token(), Some("abc"));

        config.token_expires_at = Some(Utc::now() - Duration::hours(1));
        assert_eq!(config.active_token(), None);

        config.clear_session();
        assert!(config.token.is_none());
        assert!(config.current_user.is_none());
    }
}
