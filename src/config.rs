use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_BASE_URL;
use crate::coordinator::{CoordinatorOptions, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE};
use crate::error::SpeciesError;
use crate::search::SearchMode;
use crate::store::JsonFileStore;

pub const CONFIG_FILE_NAME: &str = "kira-species.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub search_debounce_ms: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub store_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub page_size: u32,
    pub search_debounce: Duration,
    pub timeout: Duration,
    pub store_path: Utf8PathBuf,
}

impl ResolvedConfig {
    pub fn coordinator_options(&self, search_mode: SearchMode) -> CoordinatorOptions {
        CoordinatorOptions {
            page_size: self.page_size,
            search_debounce: self.search_debounce,
            search_mode,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config file. An explicit path must exist; the default
    /// `kira-species.json` in the working directory is optional.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SpeciesError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SpeciesError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SpeciesError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SpeciesError> {
        let base_url = config
            .base_url
            .map(|url| url.trim().to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SpeciesError::InvalidConfig(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }

        let page_size = config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(SpeciesError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }

        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(SpeciesError::InvalidConfig(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        let search_debounce = config
            .search_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEARCH_DEBOUNCE);

        let store_path = match config.store_path {
            Some(path) => Utf8PathBuf::from(path),
            None => JsonFileStore::default_path()?,
        };

        Ok(ResolvedConfig {
            base_url,
            page_size,
            search_debounce,
            timeout: Duration::from_secs(timeout_secs),
            store_path,
        })
    }
}
