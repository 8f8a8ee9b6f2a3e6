use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;
use tracing::debug;

pub const DATA_DIR_VAR: &str = "SHOWCASE_DATA_DIR";
pub const PUBLIC_BASE_URL_VAR: &str = "SHOWCASE_PUBLIC_BASE_URL";
pub const STUDENTS_DIR_VAR: &str = "SHOWCASE_STUDENTS_DIR";
pub const FETCH_TIMEOUT_VAR: &str = "SHOWCASE_FETCH_TIMEOUT_SECS";

const DEFAULT_STUDENTS_DIR: &str = "public/students";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine a data directory; set SHOWCASE_DATA_DIR")]
    NoDataDir,

    #[error("Invalid SHOWCASE_FETCH_TIMEOUT_SECS value '{0}': expected a positive number of seconds")]
    InvalidTimeout(String),

    #[error("Invalid SHOWCASE_PUBLIC_BASE_URL value '{0}': expected an http:// or https:// URL")]
    InvalidBaseUrl(String),
}

/// Process configuration, read once at startup and passed down.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Holds the metadata document, the blob tree and the sync lock
    pub data_dir: PathBuf,
    pub public_base_url: Option<String>,
    /// Root of the static hosting mirror written by sync
    pub students_dir: PathBuf,
    pub fetch_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = match var(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let dir = dirs::data_local_dir()
                    .ok_or(ConfigError::NoDataDir)?
                    .join("showcase");
                debug!("{DATA_DIR_VAR} not set, using default: {}", dir.display());
                dir
            }
        };

        let public_base_url = match var(PUBLIC_BASE_URL_VAR) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Some(url),
            Some(url) => return Err(ConfigError::InvalidBaseUrl(url)),
            None => None,
        };

        let students_dir = var(STUDENTS_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STUDENTS_DIR));

        let fetch_timeout = match var(FETCH_TIMEOUT_VAR) {
            Some(value) => parse_timeout(&value)?,
            None => Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        };

        Ok(Self {
            data_dir,
            public_base_url,
            students_dir,
            fetch_timeout,
        })
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("projects.json")
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    pub fn sync_lock_path(&self) -> PathBuf {
        self.data_dir.join("sync.lock")
    }
}

/// Parses a positive number of seconds
pub fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(value.to_string())),
    }
}
