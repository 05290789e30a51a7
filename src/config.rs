//! TOML configuration for the relay.
//!
//! All sections use `#[serde(default)]` so any subset of keys can be
//! specified. The bot token may come from the `FEEDRELAY_BOT_TOKEN` env var,
//! which takes precedence over the file. `Config` is `PartialEq` so the
//! reconciliation loop can compare snapshots without re-diffing workers.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Poll intervals below this are clamped up, not rejected.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("feed group with empty label")]
    EmptyGroupLabel,

    #[error("duplicate feed group label '{0}'")]
    DuplicateGroup(String),

    #[error("feed group '{0}' has no URLs")]
    NoUrls(String),

    #[error("feed group '{group}' has invalid URL '{url}': {source}")]
    InvalidUrl {
        group: String,
        url: String,
        source: url::ParseError,
    },

    #[error("feed group '{0}' has a zero poll interval")]
    ZeroInterval(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub feeds: Vec<FeedGroupConfig>,
    pub settings: Settings,
}

/// Telegram transport settings. The token never appears in Debug output.
#[derive(Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Override for the API base, e.g. a local bot-api proxy.
    pub api_url: Option<String>,
    pub users: Vec<i64>,
    pub channels: Vec<String>,
}

impl TelegramConfig {
    /// Resolve the bot token: env var wins over the config file.
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var("FEEDRELAY_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.bot_token.clone())
    }
}

/// Mask the bot token to keep it out of logs and error messages.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("users", &self.users)
            .field("channels", &self.channels)
            .finish()
    }
}

/// One named set of feed URLs sharing a polling interval and keyword filter.
///
/// Immutable once handed to a worker; reconfiguration replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedGroupConfig {
    pub group: String,
    pub urls: Vec<String>,
    pub interval_secs: u64,
    pub keywords: Vec<String>,
    pub allow_partial_match: bool,
}

impl Default for FeedGroupConfig {
    fn default() -> Self {
        Self {
            group: String::new(),
            urls: Vec::new(),
            interval_secs: 300,
            keywords: Vec::new(),
            allow_partial_match: false,
        }
    }
}

impl FeedGroupConfig {
    /// Effective poll interval, clamped to [`MIN_POLL_INTERVAL`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs).max(MIN_POLL_INTERVAL)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch_timeout_secs: u64,
    pub config_poll_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            config_poll_secs: 60,
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn config_poll_interval(&self) -> Duration {
        Duration::from_secs(self.config_poll_secs)
    }
}

impl Config {
    /// Load and parse the config file. A missing file is an error here; the
    /// caller decides whether that is fatal (it is at startup) or means
    /// "keep the previous configuration" (in the reconciliation loop).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), groups = config.feeds.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_groups(&self.feeds)
    }
}

/// Validate a set of feed groups: non-empty unique labels, at least one
/// parseable URL each, non-zero interval. Used both at startup and before
/// every live reconfiguration; a failing set is rejected wholesale and the
/// previous configuration stays active.
pub fn validate_groups(groups: &[FeedGroupConfig]) -> Result<(), ConfigError> {
    let mut labels = HashSet::new();
    for group in groups {
        if group.group.trim().is_empty() {
            return Err(ConfigError::EmptyGroupLabel);
        }
        if !labels.insert(group.group.as_str()) {
            return Err(ConfigError::DuplicateGroup(group.group.clone()));
        }
        if group.urls.is_empty() {
            return Err(ConfigError::NoUrls(group.group.clone()));
        }
        for raw in &group.urls {
            url::Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
                group: group.group.clone(),
                url: raw.clone(),
                source,
            })?;
        }
        if group.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval(group.group.clone()));
        }
    }
    Ok(())
}
