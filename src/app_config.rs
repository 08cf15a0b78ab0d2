//! Application configuration from file and environment variables
//! Configuration surface for the harvester binary.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with `ESPY_`)
//! 2. Config file (`espy.toml`)
//! 3. Default values
//!
//! Grounded in `app_config.rs`'s `AppConfig::load`/`Environment::with_prefix`
//! layering, narrowed to the three knobs the harvester needs instead of a
//! forum application's full settings surface.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config file, using defaults: {e}");
        AppConfig::default()
    }))
});

/// Main application configuration: a database file path, a lookback
/// duration in days, and a sub-forum descent flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path to the SQLite database file.
    pub database: String,
    /// Default lookback window, in days, for a scrape with no explicit
    /// cutoff argument.
    pub lookback_days: u32,
    /// Whether forum walks recurse into sub-forums by default.
    pub descend_subforums: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: "espy.sqlite3".to_string(),
            lookback_days: 7,
            descend_subforums: true,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("espy.toml")
    }

    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("ESPY")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Returns a clone of the current configuration.
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}
