//! Configuration management for Herald.
//!
//! Configuration is read from `~/.config/herald/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! A few secrets can also come from the environment, see
//! [`Config::apply_env_overrides`].

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ENV_BOT_TOKEN: &str = "HERALD_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "HERALD_CHAT_ID";
pub const ENV_DATA_DIR: &str = "HERALD_DATA_DIR";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the database lives; defaults to the platform data directory.
    pub data_dir: Option<PathBuf>,
    pub telegram: TelegramConfig,
    pub poll: PollConfig,
    pub http: HttpConfig,
    pub enrichment: EnrichmentConfig,
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Channel or chat id, e.g. `-1001234567890` or `@my_channel`.
    pub chat_id: String,
    pub api_base: String,
    pub disable_link_preview: bool,
    pub inline_buttons: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            disable_link_preview: true,
            inline_buttons: true,
        }
    }
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Initial interval; an interval set at runtime is persisted and wins.
    pub interval_secs: u64,
    /// Feeds fetched concurrently.
    pub workers: usize,
    pub run_on_start: bool,
    /// Longest Telegram `retry_after` honoured before giving up until the next cycle.
    pub max_rate_limit_wait_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            workers: 4,
            run_on_start: true,
            max_rate_limit_wait_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: concat!("herald/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Oldest delivered ids beyond this count are pruned; 0 keeps all.
    pub max_entries: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { max_entries: 50_000 }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path when `None`.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
                path: config_path.clone(),
                source: e,
            })?;

            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: config_path,
                source: e,
            })?
        } else {
            Self::create_default_config(&config_path)?;
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Get the default config file path: `~/.config/herald/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("herald").join("config.toml"))
    }

    /// Override file values with `HERALD_BOT_TOKEN`, `HERALD_CHAT_ID` and
    /// `HERALD_DATA_DIR` when set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(ENV_BOT_TOKEN) {
            self.telegram.bot_token = token;
        }
        if let Some(chat_id) = non_empty(ENV_CHAT_ID) {
            self.telegram.chat_id = chat_id;
        }
        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Resolve the data directory, creating it if needed.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("herald"),
        };

        fs::create_dir_all(&dir).map_err(|e| ConfigError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Herald Configuration
#
# Sources and filters are managed with `herald source ...` and
# `herald filter ...`; they live in the database, not here.

# Database location (default: platform data dir, e.g. ~/.local/share/herald)
# data_dir = "/var/lib/herald"

[telegram]
# Bot token and destination. Can also be set with HERALD_BOT_TOKEN and
# HERALD_CHAT_ID.
bot_token = ""
chat_id = ""
api_base = "https://api.telegram.org"
disable_link_preview = true
# Attach "Download Torrent" / "View Page" buttons to each message
inline_buttons = true

[poll]
# Initial poll interval in seconds. `herald interval 10m` overrides it.
interval_secs = 300
# Feeds fetched in parallel
workers = 4
# Poll once immediately when the daemon starts
run_on_start = true
# Longest Telegram rate-limit wait honoured within a cycle
max_rate_limit_wait_secs = 30

[http]
timeout_secs = 15

[enrichment]
# Fetch the entry page for size/category/magnet when the feed lacks them
enabled = true
timeout_secs = 10

[dedup]
# Delivered ids to remember; the oldest are pruned first. 0 = unlimited
max_entries = 50000
"##
        .to_string()
    }
}

/// Configuration errors, including rejected operator input.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid input: {0}")]
    Invalid(String),
}
