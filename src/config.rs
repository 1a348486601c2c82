//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::DEFAULT_QUOTA_BYTES;
use crate::services::offline_cache::{
    CacheConfig, DEFAULT_CACHE_NAME, DEFAULT_OFFLINE_PAGE, DEFAULT_PRECACHE,
};
use crate::services::WatchOptions;

const DEFAULT_TILE_URL_TEMPLATE: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Origin serving the static app shell
    pub shell_origin: String,
    /// Directory holding local storage files
    pub data_dir: PathBuf,
    /// Local storage size limit
    pub storage_quota_bytes: usize,
    /// Current cache generation name
    pub cache_name: String,
    /// Offline fallback page, relative to the shell origin
    pub offline_page: String,
    /// Shell assets precached on install
    pub precache: Vec<String>,
    /// Map tile URL with `{z}`, `{x}` and `{y}` placeholders
    pub tile_url_template: String,
    /// Location fix acquisition timeout
    pub location_timeout: Duration,
    pub location_enabled: bool,
    pub camera_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            shell_origin: env::var("SHELL_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            storage_quota_bytes: parse_var("STORAGE_QUOTA_BYTES", DEFAULT_QUOTA_BYTES)?,
            cache_name: env::var("CACHE_NAME").unwrap_or_else(|_| DEFAULT_CACHE_NAME.to_string()),
            offline_page: env::var("OFFLINE_PAGE")
                .unwrap_or_else(|_| DEFAULT_OFFLINE_PAGE.to_string()),
            precache: env::var("PRECACHE")
                .map(|v| split_list(&v))
                .unwrap_or_else(|_| default_precache()),
            tile_url_template: env::var("TILE_URL_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_TILE_URL_TEMPLATE.to_string()),
            location_timeout: Duration::from_secs(parse_var("LOCATION_TIMEOUT_SECS", 10)?),
            location_enabled: parse_var("LOCATION_ENABLED", true)?,
            camera_enabled: parse_var("CAMERA_ENABLED", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Config for tests: in-memory friendly values and a fake shell origin.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            shell_origin: "http://shell.test".to_string(),
            data_dir: PathBuf::from("data"),
            storage_quota_bytes: DEFAULT_QUOTA_BYTES,
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            offline_page: DEFAULT_OFFLINE_PAGE.to_string(),
            precache: vec![
                "index.html".to_string(),
                "app.js".to_string(),
                DEFAULT_OFFLINE_PAGE.to_string(),
            ],
            tile_url_template: DEFAULT_TILE_URL_TEMPLATE.to_string(),
            location_timeout: Duration::from_secs(10),
            location_enabled: true,
            camera_enabled: true,
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shell_url()?;
        self.tile_host()?;
        if !self.precache.iter().any(|p| *p == self.offline_page) {
            return Err(ConfigError::Invalid(
                "PRECACHE",
                format!("must include the offline page {}", self.offline_page),
            ));
        }
        Ok(())
    }

    /// Shell origin as a base URL for relative paths.
    pub fn shell_url(&self) -> Result<Url, ConfigError> {
        let mut origin = self.shell_origin.clone();
        if !origin.ends_with('/') {
            origin.push('/');
        }
        Url::parse(&origin).map_err(|e| ConfigError::Invalid("SHELL_ORIGIN", e.to_string()))
    }

    /// Host of the tile server.
    pub fn tile_host(&self) -> Result<String, ConfigError> {
        let sample = self.tile_url(0, 0, 0);
        Url::parse(&sample)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| ConfigError::Invalid("TILE_URL_TEMPLATE", sample))
    }

    /// Tile URL for one tile.
    pub fn tile_url(&self, z: u32, x: u32, y: u32) -> String {
        self.tile_url_template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    pub fn cache_config(&self) -> Result<CacheConfig, ConfigError> {
        Ok(CacheConfig {
            cache_name: self.cache_name.clone(),
            scope: self.shell_url()?,
            precache: self.precache.clone(),
            offline_page: self.offline_page.clone(),
            tile_hosts: vec![self.tile_host()?],
        })
    }

    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: true,
            timeout: self.location_timeout,
        }
    }
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
