// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};
use std::time::Duration;

use osu_mirror_db::StoreOptions;
use serde::{Deserialize, Serialize};

use crate::error::{Error, IoContext, Result};
use crate::filter::{BeatmapFilter, FilterConfig};

/// Environment variable naming the settings file to load.
pub const CONFIG_ENV: &str = "OSU_MIRROR_CONFIG";

/// Settings file picked up from the working directory.
pub const DEFAULT_SETTINGS: &str = "settings.toml";

fn default_database() -> PathBuf {
    PathBuf::from("./database.db")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./Downloads")
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// SQLite database holding the catalog and the downloaded markers
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Directory beatmapset archives are stored in
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// JSON array of catalog entries to import
    #[serde(default)]
    pub catalog_dump: Option<PathBuf>,

    /// Persist fetched catalog entries, replacing older copies
    #[serde(default = "default_true")]
    pub record_beatmaps: bool,

    /// Also consider beatmaps recorded by earlier runs
    #[serde(default)]
    pub lookup_beatmaps_in_database: bool,

    /// Route writes through a background connection
    #[serde(default = "default_true")]
    pub threaded_writes: bool,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub filters: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            download_dir: default_download_dir(),
            catalog_dump: None,
            record_beatmaps: true,
            lookup_beatmaps_in_database: false,
            threaded_writes: true,
            busy_timeout_ms: default_busy_timeout_ms(),
            log_level: default_log_level(),
            filters: FilterConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.busy_timeout_ms == 0 {
            return Err(Error::config("busy_timeout_ms must be greater than 0"));
        }
        BeatmapFilter::from_config(&self.filters)?;
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..StoreOptions::default()
        }
    }
}

/// Load the settings named by `OSU_MIRROR_CONFIG`, else `settings.toml` from
/// the working directory, else the defaults.
pub fn load() -> Result<Config> {
    let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    resolve(explicit.as_deref(), Path::new(DEFAULT_SETTINGS))
}

fn resolve(explicit: Option<&Path>, fallback: &Path) -> Result<Config> {
    match explicit {
        Some(path) => Config::from_file(path),
        None if fallback.exists() => Config::from_file(fallback),
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_when_nothing_configured() {
        let dir = TempDir::new().unwrap();
        let config = resolve(None, &dir.path().join("settings.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database, PathBuf::from("./database.db"));
        assert!(config.record_beatmaps);
        assert!(!config.lookup_beatmaps_in_database);
        assert_eq!(config.store_options().busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_field_defaults() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("settings.toml");
        fs::write(
            &fallback,
            r#"
            download_dir = "/srv/osu"
            threaded_writes = false

            [filters]
            approved = [1, 4]
            difficulty = "5-6.5"
            "#,
        )
        .unwrap();

        let config = resolve(None, &fallback).unwrap();
        assert_eq!(config.download_dir, PathBuf::from("/srv/osu"));
        assert!(!config.threaded_writes);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.filters.approved, [1, 4]);
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("settings.toml");
        let explicit = dir.path().join("other.toml");
        fs::write(&fallback, "log_level = \"warn\"").unwrap();
        fs::write(&explicit, "log_level = \"debug\"").unwrap();

        let config = resolve(Some(&explicit), &fallback).unwrap();
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");

        fs::write(&path, "busy_timeout_ms = 0").unwrap();
        assert!(matches!(resolve(Some(&path), &path), Err(Error::Config { .. })));

        fs::write(&path, "databse = \"typo.db\"").unwrap();
        assert!(matches!(resolve(Some(&path), &path), Err(Error::Toml(_))));

        fs::write(&path, "[filters]\ndifficulty = \"hard\"").unwrap();
        assert!(matches!(resolve(Some(&path), &path), Err(Error::Filter { .. })));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(resolve(Some(&missing), &path), Err(Error::Io { .. })));
    }
}
