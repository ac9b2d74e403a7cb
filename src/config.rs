// ABOUTME: Client configuration loaded from defaults, a TOML file and the environment
// ABOUTME: Controls the API base URL, poll interval, timeouts and credentials location

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const API_URL_ENV: &str = "ORCHESITY_API_URL";
pub const POLL_INTERVAL_ENV: &str = "ORCHESITY_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub credentials_path: PathBuf,
}

/// On-disk shape; every field is optional so partial files work.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    credentials_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            credentials_path: config_dir().join("credentials.toml"),
        }
    }
}

/// `$HOME/.config/orchesity`, or `./.orchesity` when no home is set.
pub fn config_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config").join("orchesity"),
        None => PathBuf::from(".orchesity"),
    }
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl ClientConfig {
    /// Defaults, then the file at `path` if it exists, then environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::default();

        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let file: ConfigFile = toml::from_str(&raw)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            config.apply_file(file);
            tracing::debug!(path = %path.display(), "Loaded config file");
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(url) = file.api_base_url {
            self.api_base_url = url;
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = file.credentials_path {
            self.credentials_path = path;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(ms) = lookup(POLL_INTERVAL_ENV).filter(|v| !v.trim().is_empty()) {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| {
                    format!("{} must be a number of milliseconds", POLL_INTERVAL_ENV)
                })?;
            self.poll_interval = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!(
                "api_base_url must start with http:// or https://, got '{}'",
                self.api_base_url
            );
        }
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll interval must be greater than zero");
        }
        if self.request_timeout.is_zero() {
            anyhow::bail!("request timeout must be greater than zero");
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }
}
