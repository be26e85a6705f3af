//! Configuration for the pitwall batch jobs.

use serde::{Deserialize, Serialize};

/// Warehouse storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Directory holding the staging CSV tables.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// Directory the prepared feature table is written to.
    #[serde(default = "default_prepared_dir")]
    pub prepared_dir: String,
}

fn default_staging_dir() -> String {
    "data/staging".to_string()
}

fn default_prepared_dir() -> String {
    "data/prepared".to_string()
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            prepared_dir: default_prepared_dir(),
        }
    }
}

/// Session source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Root directory of the per-round session JSON files.
    #[serde(default = "default_sessions_dir")]
    pub dir: String,
}

fn default_sessions_dir() -> String {
    "data/sessions".to_string()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file, and the
    /// environment (PITWALL_WAREHOUSE_STAGING_DIR, etc.).
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("PITWALL")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
