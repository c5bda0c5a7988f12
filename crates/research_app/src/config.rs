use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::LevelFilter;
use research_engine::{
    ApiSettings, ExportOptions, PollSettings, RestoreSettings, SessionOptions, TokioSleeper,
    DEFAULT_BASE_URL, DEFAULT_USER_ID,
};
use research_logging::parse_level;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogDestination;

pub const CONFIG_PATH_ENV: &str = "RESEARCH_CHAT_CONFIG";
pub const API_BASE_ENV: &str = "RESEARCH_API_BASE";
pub const USER_ID_ENV: &str = "RESEARCH_USER_ID";
pub const LOG_LEVEL_ENV: &str = "RESEARCH_LOG_LEVEL";
const DEFAULT_CONFIG_PATH: &str = "./research_chat.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("unknown log level {0:?}")]
    InvalidLevel(String),
}

/// Where the settings came from, reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults(PathBuf),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "config file {}", path.display()),
            Self::Defaults(path) => write!(f, "built-in defaults ({} not found)", path.display()),
        }
    }
}

/// Client settings. Every field is optional in the RON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub user_id: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_response_bytes: u64,
    pub restore_retries: u32,
    pub restore_retry_delay_secs: u64,
    pub export_dir: PathBuf,
    pub log_level: String,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let poll = PollSettings::default();
        let restore = RestoreSettings::default();
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            poll_interval_secs: poll.interval.as_secs(),
            max_poll_attempts: poll.max_attempts,
            connect_timeout_secs: api.connect_timeout.as_secs(),
            request_timeout_secs: api.request_timeout.as_secs(),
            max_response_bytes: api.max_bytes,
            restore_retries: restore.retries,
            restore_retry_delay_secs: restore.delay.as_secs(),
            export_dir: PathBuf::from("./exports"),
            log_level: "info".to_string(),
            log_destination: LogDestination::default(),
        }
    }
}

impl AppConfig {
    /// Reads the file named by `RESEARCH_CHAT_CONFIG` (or the default path),
    /// then applies environment overrides.
    pub fn load() -> Result<(Self, ConfigOrigin), ConfigError> {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let (config, origin) = Self::from_file(&path)?;
        Ok((config.with_overrides(|key| env::var(key).ok())?, origin))
    }

    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn from_file(path: &Path) -> Result<(Self, ConfigOrigin), ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok((Self::default(), ConfigOrigin::Defaults(path.to_path_buf())))
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok((config, ConfigOrigin::File(path.to_path_buf())))
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(base) = lookup(API_BASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = base;
        }
        if let Some(user) = lookup(USER_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.user_id = user;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.log_level = level;
        }
        self.level_filter()?;
        Ok(self)
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        parse_level(&self.log_level).ok_or_else(|| ConfigError::InvalidLevel(self.log_level.clone()))
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_base_url.clone(),
            user_id: self.user_id.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_response_bytes,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            poll: PollSettings {
                interval: Duration::from_secs(self.poll_interval_secs),
                max_attempts: self.max_poll_attempts,
            },
            restore: RestoreSettings {
                retries: self.restore_retries,
                delay: Duration::from_secs(self.restore_retry_delay_secs),
            },
            sleeper: Arc::new(TokioSleeper),
            ..SessionOptions::default()
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            output_dir: self.export_dir.clone(),
            ..ExportOptions::default()
        }
    }
}
