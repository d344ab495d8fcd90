use crate::database::{ConnectionSettings, DEFAULT_DATABASE_FILE};
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TinkerConfig {
    /// Path to the directory holding the database file
    pub data_dir: String,

    /// Name of the database file inside `data_dir` (default: tinker_foss.db)
    pub database_file: String,

    /// Maximum number of pooled connections (default: 4)
    pub pool_size: u32,

    /// How long a statement waits on a locked database, in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,

    /// How long to wait for a free pooled connection, in seconds (default: 5)
    pub connection_timeout_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### tinker-store configuration file

### directory holding the database file (default: ./data)
# data_dir = "./data"

### database file name inside data_dir
# database_file = "tinker_foss.db"

### connection settings
# pool_size = 4
# busy_timeout_ms = 5000
# connection_timeout_secs = 5
"#;

fn default_data_dir() -> String {
    std::env::current_dir()
        .map(|d| d.join("data"))
        .unwrap_or_else(|_| PathBuf::from("data"))
        .to_string_lossy()
        .to_string()
}

impl Default for TinkerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            pool_size: 4,
            busy_timeout_ms: 5000,
            connection_timeout_secs: 5,
        }
    }
}

impl TinkerConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Reads the TOML file at `path` (or [`default_config_path`](Self::default_config_path)),
    /// writing an annotated empty template if it doesn't exist yet, then applies
    /// `TINKER_*` environment overrides.
    pub fn new(path: &Option<String>) -> Result<TinkerConfig> {
        let mut builder = Config::builder();

        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow!("Could not convert path to string"))?;
            builder = builder.add_source(config::File::with_name(path_str));
        } else {
            if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("Unable to create config directory: {}", e))?;
            }
            std::fs::write(&config_path, EMPTY_CONFIG).map_err(|e| {
                anyhow!(
                    "Unable to create config file {}: {}",
                    config_path.display(),
                    e
                )
            })?;
        }

        // Add in settings from the environment (with a prefix of TINKER)
        // E.g., `TINKER_DATA_DIR=/var/lib/tinker ./tinker-store` would set the data directory
        builder = builder.add_source(config::Environment::with_prefix("TINKER"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<TinkerConfig> {
        let defaults = TinkerConfig::default();

        let data_dir = config
            .get("data_dir")
            .cloned()
            .unwrap_or(defaults.data_dir);

        let database_file = config
            .get("database_file")
            .cloned()
            .unwrap_or(defaults.database_file);
        if database_file.is_empty() {
            return Err(anyhow!("database_file must not be empty"));
        }

        let pool_size = parse_or(config, "pool_size", defaults.pool_size)?;
        if pool_size == 0 {
            return Err(anyhow!("pool_size must be at least 1"));
        }

        Ok(TinkerConfig {
            data_dir,
            database_file,
            pool_size,
            busy_timeout_ms: parse_or(config, "busy_timeout_ms", defaults.busy_timeout_ms)?,
            connection_timeout_secs: parse_or(
                config,
                "connection_timeout_secs",
                defaults.connection_timeout_secs,
            )?,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.database_file)
    }

    /// Connection settings for the configured database file
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::new(self.sqlite_path())
            .with_pool_size(self.pool_size)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_connection_timeout(Duration::from_secs(self.connection_timeout_secs))
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path().display()),
            format!("Pool Size:          {}", self.pool_size),
            format!("Busy Timeout:       {} ms", self.busy_timeout_ms),
            format!("Connection Timeout: {} seconds", self.connection_timeout_secs),
        ]
        .join("\n")
    }

    /// Get the default config file path: `$HOME/.tinker/tinker.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home_dir.join(".tinker").join("tinker.toml"))
    }
}

fn parse_or<T>(config: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match config.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", key, raw, e)),
        None => Ok(default),
    }
}
