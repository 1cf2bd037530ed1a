use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::trigger::WebhookEvent;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub credentials: CredentialsConfig,
    pub trigger: Option<TriggerConfig>,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Chatwoot account credentials: instance URL and personal access token.
#[derive(Clone, Deserialize)]
pub struct CredentialsConfig {
    pub base_url: String,
    pub access_token: String,
    /// Default account used when an operation has no `accountId` parameter.
    pub account_id: Option<u64>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    pub node_name: String,
    /// Public URL Chatwoot will POST events to.
    pub public_url: String,
    /// Callback URL used while `test_mode` is on. Must differ from `public_url`.
    pub test_public_url: Option<String>,
    pub events: Vec<WebhookEvent>,
    pub inbox_id: Option<u64>,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_qr_interval_ms")]
    pub qr_interval_ms: u64,
    #[serde(default = "default_qr_max_attempts")]
    pub qr_max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            qr_interval_ms: default_qr_interval_ms(),
            qr_max_attempts: default_qr_max_attempts(),
        }
    }
}

impl PollingConfig {
    pub fn qr_interval(&self) -> Duration {
        Duration::from_millis(self.qr_interval_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.credentials.apply_env_overrides()?;
        Ok(config)
    }

    pub fn trigger(&self) -> Result<&TriggerConfig> {
        self.trigger
            .as_ref()
            .context("Missing [trigger] section in config file")
    }
}

impl CredentialsConfig {
    /// `CHATWOOT_BASE_URL`, `CHATWOOT_API_TOKEN` and `CHATWOOT_ACCOUNT_ID`
    /// take precedence over the file.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(base_url) = std::env::var("CHATWOOT_BASE_URL") {
            self.base_url = base_url;
        }
        if let Ok(token) = std::env::var("CHATWOOT_API_TOKEN") {
            self.access_token = token;
        }
        if let Ok(account_id) = std::env::var("CHATWOOT_ACCOUNT_ID") {
            self.account_id = Some(
                account_id
                    .parse()
                    .context("CHATWOOT_ACCOUNT_ID must be a number")?,
            );
        }
        Ok(())
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:5678".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("chatwoot-node-state.json")
}

fn default_qr_interval_ms() -> u64 {
    2000
}

fn default_qr_max_attempts() -> u32 {
    30
}
