use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub folders: Option<FoldersConfig>,
    pub grobid: Option<GrobidConfig>,
    pub ilibrarian: Option<ILibrarianConfig>,
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldersConfig {
    pub watch: Option<String>,
    pub processed: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrobidConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ILibrarianConfig {
    pub upload_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub interval_minutes: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/paperdrop/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperdrop").join("config.toml"))
}

/// Load config by cascading CWD `.paperdrop.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".paperdrop.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Load a config the user asked for by name. Unlike [`load_from_path`],
/// a missing or broken file is an error.
pub fn load_explicit(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        folders: Some(FoldersConfig {
            watch: overlay
                .folders
                .as_ref()
                .and_then(|f| f.watch.clone())
                .or_else(|| base.folders.as_ref().and_then(|f| f.watch.clone())),
            processed: overlay
                .folders
                .as_ref()
                .and_then(|f| f.processed.clone())
                .or_else(|| base.folders.as_ref().and_then(|f| f.processed.clone())),
        }),
        grobid: Some(GrobidConfig {
            url: overlay
                .grobid
                .as_ref()
                .and_then(|g| g.url.clone())
                .or_else(|| base.grobid.as_ref().and_then(|g| g.url.clone())),
        }),
        ilibrarian: Some(ILibrarianConfig {
            upload_url: overlay
                .ilibrarian
                .as_ref()
                .and_then(|i| i.upload_url.clone())
                .or_else(|| base.ilibrarian.as_ref().and_then(|i| i.upload_url.clone())),
            user: overlay
                .ilibrarian
                .as_ref()
                .and_then(|i| i.user.clone())
                .or_else(|| base.ilibrarian.as_ref().and_then(|i| i.user.clone())),
            password: overlay
                .ilibrarian
                .as_ref()
                .and_then(|i| i.password.clone())
                .or_else(|| base.ilibrarian.as_ref().and_then(|i| i.password.clone())),
        }),
        schedule: Some(ScheduleConfig {
            interval_minutes: overlay
                .schedule
                .as_ref()
                .and_then(|s| s.interval_minutes)
                .or_else(|| base.schedule.as_ref().and_then(|s| s.interval_minutes)),
            request_timeout_secs: overlay
                .schedule
                .as_ref()
                .and_then(|s| s.request_timeout_secs)
                .or_else(|| {
                    base.schedule
                        .as_ref()
                        .and_then(|s| s.request_timeout_secs)
                }),
        }),
    }
}
