//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! where curricula are published, an optional local directory to read them
//! from instead, and the quota of the local key/value store.
//!
//! Configuration is stored at `~/.config/mallas/config.json`. The
//! `MALLAS_BASE_URL` and `MALLAS_DATA_DIR` environment variables override
//! the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

use crate::storage::DEFAULT_QUOTA;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "mallas";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Key/value store file name in the cache directory
const STORE_FILE: &str = "storage.json";

/// Directory read when neither a base URL nor a data directory is set,
/// the static-asset folder of the web front end.
const DEFAULT_DATA_DIR: &str = "public";

const BASE_URL_ENV: &str = "MALLAS_BASE_URL";
const DATA_DIR_ENV: &str = "MALLAS_DATA_DIR";

/// Where curriculum documents are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Http(String),
    Directory(PathBuf),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub storage_quota: Option<usize>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `MALLAS_BASE_URL` / `MALLAS_DATA_DIR` from the environment.
    pub fn apply_env(self) -> Self {
        self.with_overrides(
            std::env::var(BASE_URL_ENV).ok(),
            std::env::var(DATA_DIR_ENV).ok(),
        )
    }

    /// Replace the source settings with any non-empty override given.
    pub fn with_overrides(mut self, base_url: Option<String>, data_dir: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|s| !s.is_empty()) {
            self.base_url = Some(url);
            self.data_dir = None;
        }
        if let Some(dir) = data_dir.filter(|s| !s.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// A data directory wins over a base URL; with neither, `./public`.
    pub fn source(&self) -> SourceLocation {
        match (&self.data_dir, &self.base_url) {
            (Some(dir), _) => SourceLocation::Directory(dir.clone()),
            (None, Some(url)) => SourceLocation::Http(url.clone()),
            (None, None) => SourceLocation::Directory(PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }

    pub fn quota(&self) -> usize {
        self.storage_quota.unwrap_or(DEFAULT_QUOTA)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(STORE_FILE))
    }
}
