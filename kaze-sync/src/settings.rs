//! Application settings.
//!
//! Settings live in `~/.config/kaze/settings.toml`. Every field is optional;
//! a missing file means all defaults. A handful of environment variables
//! override the file, and the cron secret is only ever read from the
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kaze_connector::HttpConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::{BatchOptions, DEFAULT_BATCH_LIMIT, DEFAULT_MAX_WORKERS, MAX_WORKERS};
use crate::resolver::MatchPolicy;
use crate::trigger::Environment;

pub const ENV_DATABASE: &str = "KAZE_DB";
pub const ENV_ENVIRONMENT: &str = "KAZE_ENV";
pub const ENV_CRON_SECRET: &str = "KAZE_CRON_SECRET";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for ${var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

/// Canonical path to the settings file: `~/.config/kaze/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("kaze").join("settings.toml")
}

/// Default database location: `<data dir>/kaze/kaze.db`.
pub fn default_database_path() -> PathBuf {
    let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    data.join("kaze").join("kaze.db")
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: Option<PathBuf>,
    pub sync: SyncSettings,
    pub http: HttpSettings,
    pub server: ServerSettings,
    /// Bearer secret for the batch trigger. Never read from or written to the file.
    #[serde(skip)]
    pub cron_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    pub batch_limit: u32,
    pub max_workers: usize,
    pub item_timeout_secs: u64,
    pub match_policy: MatchPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            max_workers: DEFAULT_MAX_WORKERS,
            item_timeout_secs: 60,
            match_policy: MatchPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: Option<String>,
    pub request_timeout_secs: u64,
    pub min_request_interval_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout_secs: 30,
            min_request_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub environment: Environment,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            environment: Environment::Development,
        }
    }
}

impl Settings {
    /// Load settings from the canonical path, then apply environment overrides.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_from(&settings_path())?;
        settings.apply_env(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    /// Load settings from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `KAZE_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(env) = lookup(ENV_ENVIRONMENT).filter(|v| !v.is_empty()) {
            self.server.environment =
                env.parse().map_err(|_| SettingsError::InvalidEnv {
                    var: ENV_ENVIRONMENT,
                    value: env.clone(),
                })?;
        }
        self.cron_secret = lookup(ENV_CRON_SECRET).filter(|v| !v.is_empty());
        Ok(())
    }

    /// Database path, falling back to the default location.
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_database_path)
    }

    /// HTTP behaviour for connectors.
    pub fn http_config(&self) -> HttpConfig {
        let mut config = HttpConfig {
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            min_request_interval: Duration::from_millis(self.http.min_request_interval_ms),
            ..HttpConfig::default()
        };
        if let Some(agent) = &self.http.user_agent {
            config.user_agent = agent.clone();
        }
        config
    }

    /// Batch options with the worker count clamped to a sane range.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            limit: self.sync.batch_limit,
            max_workers: self.sync.max_workers.clamp(1, MAX_WORKERS),
            item_timeout: Duration::from_secs(self.sync.item_timeout_secs),
            cancel: None,
        }
    }
}
