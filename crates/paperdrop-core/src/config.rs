//! Runtime configuration.
//!
//! Values resolve in order: environment variable, then config file, then
//! the built-in default. Command-line overrides are applied on top by the
//! binary since the fields are public.

use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config_file::ConfigFile;

pub const DEFAULT_WATCH_FOLDER: &str = "/papers/new";
pub const DEFAULT_PROCESSED_FOLDER: &str = "/papers/processed";
pub const DEFAULT_GROBID_URL: &str = "http://grobid:8070/api/processHeaderDocument";
pub const DEFAULT_INTERVAL_MINUTES: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be a whole number, got {value:?}: {source}")]
    InvalidNumber {
        var: &'static str,
        value: String,
        source: ParseIntError,
    },
    #[error("{var} is too large: {value}")]
    OutOfRange { var: &'static str, value: u64 },
    #[error("failed to read config file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to create folder {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Settings for the importer, built once at startup.
#[derive(Clone)]
pub struct Config {
    pub watch_folder: PathBuf,
    pub processed_folder: PathBuf,
    pub grobid_url: String,
    /// Empty means "not configured"; every upload attempt will fail.
    pub upload_url: String,
    pub upload_user: Option<String>,
    pub upload_password: Option<String>,
    pub interval_minutes: u64,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("watch_folder", &self.watch_folder)
            .field("processed_folder", &self.processed_folder)
            .field("grobid_url", &self.grobid_url)
            .field("upload_url", &self.upload_url)
            .field("upload_user", &self.upload_user)
            .field(
                "upload_password",
                &self.upload_password.as_ref().map(|_| "***"),
            )
            .field("interval_minutes", &self.interval_minutes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_folder: PathBuf::from(DEFAULT_WATCH_FOLDER),
            processed_folder: PathBuf::from(DEFAULT_PROCESSED_FOLDER),
            grobid_url: DEFAULT_GROBID_URL.to_string(),
            upload_url: String::new(),
            upload_user: None,
            upload_password: None,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Resolve configuration from the process environment over `file`.
    pub fn from_env(file: &ConfigFile) -> Result<Self, ConfigError> {
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Resolve configuration using `env` to look up variables.
    ///
    /// Empty variable values are treated as unset.
    pub fn resolve(
        file: &ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env = |name: &str| env(name).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let folders = file.folders.clone().unwrap_or_default();
        let grobid = file.grobid.clone().unwrap_or_default();
        let ilibrarian = file.ilibrarian.clone().unwrap_or_default();
        let schedule = file.schedule.clone().unwrap_or_default();

        let watch_folder = env("WATCH_FOLDER")
            .or(folders.watch)
            .map(PathBuf::from)
            .unwrap_or(defaults.watch_folder);
        let processed_folder = env("PROCESSED_FOLDER")
            .or(folders.processed)
            .map(PathBuf::from)
            .unwrap_or(defaults.processed_folder);
        let grobid_url = env("GROBID_URL")
            .or(grobid.url)
            .unwrap_or(defaults.grobid_url);
        let upload_url = env("ILIBRARIAN_UPLOAD_URL")
            .or(ilibrarian.upload_url)
            .unwrap_or(defaults.upload_url);
        let upload_user = env("ILIBRARIAN_USER").or(ilibrarian.user);
        let upload_password = env("ILIBRARIAN_PASS").or(ilibrarian.password);

        let interval_minutes = match env("INTERVAL_MINUTES") {
            Some(v) => parse_number("INTERVAL_MINUTES", v)?,
            None => schedule
                .interval_minutes
                .unwrap_or(defaults.interval_minutes),
        };
        let request_timeout_secs = match env("REQUEST_TIMEOUT_SECS") {
            Some(v) => parse_number("REQUEST_TIMEOUT_SECS", v)?,
            None => schedule
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
        };

        let config = Self {
            watch_folder,
            processed_folder,
            grobid_url,
            upload_url,
            upload_user,
            upload_password,
            interval_minutes,
            request_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot be turned into a sleep duration.
    ///
    /// Call again after changing fields directly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_minutes.checked_mul(60).is_none() {
            return Err(ConfigError::OutOfRange {
                var: "INTERVAL_MINUTES",
                value: self.interval_minutes,
            });
        }
        Ok(())
    }

    /// Time to wait between poll cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// Bound applied to each outbound HTTP request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Create the watch and processed folders, including parents.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for folder in [&self.watch_folder, &self.processed_folder] {
            create_dir(folder)?;
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_number(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidNumber { var, value, source })
}
