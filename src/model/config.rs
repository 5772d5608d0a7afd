use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ExtpackError;
use crate::sync::SyncErrorPolicy;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub install: InstallConfig,
    pub paths: PathsConfig,
    pub watch: WatchConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_file: String,
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub destination: String,
    pub watch_destination: String,
    pub watch_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub settle_ms: u64,
    pub on_error: SyncErrorPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    pub delete_pattern: String,
    #[serde(default)]
    pub rename_suffix: Option<String>,
    pub archive_path: String,
    /// Run cleanup and archive even when no list was installed.
    pub archive_without_list: bool,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config → `extra`.
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        let mut table = default_table()?;

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "extpack") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                merge_tables(&mut table, read_table(&config_path)?);
            }
        }

        if let Some(path) = extra {
            merge_tables(&mut table, read_table(path)?);
        }

        Self::from_table(table)
    }

    /// The embedded defaults alone, with `~` expanded.
    #[cfg(test)]
    pub fn defaults() -> Result<Self> {
        Self::from_table(default_table()?)
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        let mut config: AppConfig = toml::Value::Table(table)
            .try_into()
            .context("invalid configuration")?;

        config.paths.destination = expand_tilde(&config.paths.destination)?;
        config.paths.watch_destination = expand_tilde(&config.paths.watch_destination)?;
        config.paths.watch_dir = expand_tilde(&config.paths.watch_dir)?;
        config.cleanup.archive_path = expand_tilde(&config.cleanup.archive_path)?;
        config.general.log_file = expand_tilde(&config.general.log_file)?;

        // Fail at startup rather than after the installs have run.
        config.delete_pattern()?;

        Ok(config)
    }

    pub fn destination(&self) -> PathBuf {
        PathBuf::from(&self.paths.destination)
    }

    pub fn watch_destination(&self) -> PathBuf {
        PathBuf::from(&self.paths.watch_destination)
    }

    pub fn watch_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.watch_dir)
    }

    pub fn archive_path(&self) -> PathBuf {
        PathBuf::from(&self.cleanup.archive_path)
    }

    pub fn log_file(&self) -> PathBuf {
        PathBuf::from(&self.general.log_file)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.watch.settle_ms)
    }

    pub fn delete_pattern(&self) -> Result<Regex> {
        Regex::new(&self.cleanup.delete_pattern)
            .with_context(|| format!("invalid delete_pattern {:?}", self.cleanup.delete_pattern))
    }
}

fn default_table() -> Result<toml::Table> {
    toml::from_str(DEFAULTS).context("embedded default config is invalid")
}

fn read_table(path: &Path) -> Result<toml::Table, ExtpackError> {
    let raw = fs::read_to_string(path).map_err(|source| ExtpackError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&raw).map_err(|source| ExtpackError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge `overlay` into `base`; nested tables merge key by key, anything else is replaced.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

fn expand_tilde(path: &str) -> Result<String> {
    if !path.starts_with('~') {
        return Ok(path.to_string());
    }

    let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(path.replacen('~', &home.to_string_lossy(), 1))
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
