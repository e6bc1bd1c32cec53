use anyhow::{bail, Context, Result};
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::gateway::{ActionSpec, ActionTable, Method};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Backend endpoint. Apps Script deployments must use the `/exec` URL.
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Content type declared on write requests (default: text/plain)
    #[serde(default = "default_write_content_type")]
    pub write_content_type: String,
    /// Extra or overriding entries for the action table
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            write_content_type: default_write_content_type(),
            actions: Vec::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_write_content_type() -> String {
    "text/plain;charset=utf-8".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionEntry {
    pub name: String,
    pub method: Method,
    #[serde(default = "default_requires_token")]
    pub requires_token: bool,
}

fn default_requires_token() -> bool {
    true
}

impl From<&ActionEntry> for ActionSpec {
    fn from(entry: &ActionEntry) -> Self {
        ActionSpec {
            method: entry.method,
            requires_token: entry.requires_token,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// File holding the persisted token and user profile
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from("./data/session.json")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration file")
    }

    /// Parsed endpoint URL. Fails when unset, relative, not http(s), or
    /// already carrying a query string.
    pub fn endpoint(&self) -> Result<Url> {
        let Some(raw) = self.api.endpoint.as_deref() else {
            bail!("No API endpoint configured. Set api.endpoint, --endpoint or PORTAL_API_URL.");
        };

        let url = Url::parse(raw).with_context(|| format!("Invalid API endpoint: {}", raw))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("API endpoint must use http or https: {}", raw);
        }
        if url.query().is_some() {
            bail!("API endpoint must not carry a query string: {}", raw);
        }
        Ok(url)
    }

    /// Built-in action table with the configured entries applied on top.
    pub fn action_table(&self) -> Result<ActionTable> {
        let extra: Vec<(String, ActionSpec)> = self
            .api
            .actions
            .iter()
            .map(|entry| (entry.name.clone(), ActionSpec::from(entry)))
            .collect();

        ActionTable::builtin()
            .with_entries(extra)
            .context("Invalid action table in configuration")
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;
        self.action_table()?;
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be greater than zero");
        }
        if self.api.write_content_type.trim().is_empty() {
            bail!("api.write_content_type must not be empty");
        }
        if HeaderValue::from_str(&self.api.write_content_type).is_err() {
            bail!(
                "api.write_content_type is not a valid header value: {:?}",
                self.api.write_content_type
            );
        }
        Ok(())
    }
}
