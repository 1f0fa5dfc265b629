use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use concierge::providers::{DEFAULT_PROVIDER_ID, PROVIDER_ENV_VAR};
use concierge_api::ApiConfig;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV_VAR: &str = "CONCIERGE_CONFIG_PATH";
pub const BACKEND_URL_ENV_VAR: &str = "CONCIERGE_BACKEND_URL";
pub const CHAT_URL_ENV_VAR: &str = "CONCIERGE_CHAT_URL";
pub const DOWNLOAD_URL_ENV_VAR: &str = "CONCIERGE_DOWNLOAD_URL";
pub const SESSION_FILE_ENV_VAR: &str = "CONCIERGE_SESSION_FILE";

/// Command-line flags. Each URL flag falls back to its environment variable,
/// then to the config file.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "concierge", version, about = "Chat with the travel concierge from a terminal")]
pub struct Cli {
    /// Base URL of the API host (auth, user, bookings).
    #[arg(long, env = BACKEND_URL_ENV_VAR)]
    pub backend_url: Option<String>,

    /// Base URL of the streaming chat host. Defaults to the API host.
    #[arg(long, env = CHAT_URL_ENV_VAR)]
    pub chat_url: Option<String>,

    /// Base URL that serves booking invoices.
    #[arg(long, env = DOWNLOAD_URL_ENV_VAR)]
    pub download_url: Option<String>,

    /// Request timeout in seconds. Applies to the whole chat stream.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_sec: Option<u64>,

    /// Chat transport: `http` or `mock`.
    #[arg(long, env = PROVIDER_ENV_VAR, default_value = DEFAULT_PROVIDER_ID)]
    pub provider: String,

    /// Keep the signed-in session in this file between runs. Without it the
    /// session lives in memory and ends with the process.
    #[arg(long, env = SESSION_FILE_ENV_VAR, value_name = "PATH")]
    pub session_file: Option<PathBuf>,

    /// Keep the session between runs in the per-user data directory.
    #[arg(long, conflicts_with = "session_file")]
    pub remember: bool,

    /// JSON config file.
    #[arg(long, env = CONFIG_PATH_ENV_VAR, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub backend_url: Option<String>,
    pub chat_url: Option<String>,
    pub download_url: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("`timeout_sec` must be > 0 when provided")]
    InvalidTimeout,
}

/// Settings after flags, environment, and file have been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api: ApiConfig,
    pub provider: String,
    /// `None` keeps the session in memory.
    pub session_file: Option<PathBuf>,
}

pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: FileConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if config.timeout_sec == Some(0) {
        return Err(ConfigError::InvalidTimeout);
    }
    Ok(config)
}

impl Cli {
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let file = match self.config.as_deref() {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };
        self.merge(file)
    }

    /// Layer flags (already merged with env by clap) over `file`.
    pub fn merge(self, file: FileConfig) -> Result<ResolvedConfig, ConfigError> {
        let mut api = ApiConfig::default();
        if let Some(base_url) = non_empty(self.backend_url).or(non_empty(file.backend_url)) {
            api = api.with_base_url(base_url);
        }
        if let Some(chat_url) = non_empty(self.chat_url).or(non_empty(file.chat_url)) {
            api = api.with_chat_base_url(chat_url);
        }
        if let Some(download_url) = non_empty(self.download_url).or(non_empty(file.download_url)) {
            api = api.with_download_base_url(download_url);
        }
        match self.timeout_sec.or(file.timeout_sec) {
            Some(0) => return Err(ConfigError::InvalidTimeout),
            Some(seconds) => api = api.with_timeout(Duration::from_secs(seconds)),
            None => {}
        }

        let session_file = match self.session_file {
            Some(path) => Some(path),
            None if self.remember => session_store::default_session_file(),
            None => None,
        };

        Ok(ResolvedConfig {
            api,
            provider: self.provider.trim().to_string(),
            session_file,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
