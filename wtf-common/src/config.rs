//! Bootstrap configuration loading
//!
//! Resolution priority for both the config file and the database path:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error: defaults are used and a warning is
//! logged.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "WTF_DIAL_CONFIG";

/// Environment variable naming the database file
pub const DATABASE_ENV_VAR: &str = "WTF_DIAL_DATABASE";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to SQLite database file
    pub database_path: Option<PathBuf>,

    /// Connection pool size
    pub max_connections: u32,

    /// SQLite busy timeout; concurrent writers wait this long for the lock
    pub busy_timeout_ms: u64,

    /// Events buffered per subscribed user
    pub event_bus_capacity: usize,

    /// Smallest accepted membership value
    pub min_membership_value: i64,

    /// Largest accepted membership value
    pub max_membership_value: i64,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_connections: 10,
            busy_timeout_ms: 5000,
            event_bus_capacity: 100,
            min_membership_value: 0,
            max_membership_value: 100,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load the resolved config file, falling back to defaults when absent
    ///
    /// An explicitly named file (CLI or environment) that cannot be read is an
    /// error; a missing default-location file is not.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::load_resolved(cli_arg)?;
        source.log();
        Ok(config)
    }

    /// Like [`TomlConfig::load_or_default`], but report where the
    /// configuration came from instead of logging it
    ///
    /// Callers that set up logging from the loaded config use this and log
    /// the source once the subscriber exists.
    pub fn load_resolved(cli_arg: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let explicit = cli_arg
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        if let Some(path) = explicit {
            let config = Self::load(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        match default_config_file() {
            Some(path) if path.exists() => {
                let config = Self::load(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            _ => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.min_membership_value > self.max_membership_value {
            return Err(Error::Config(format!(
                "min_membership_value ({}) exceeds max_membership_value ({})",
                self.min_membership_value, self.max_membership_value
            )));
        }
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Resolve the database path in priority order
    pub fn resolve_database_path(&self, cli_arg: Option<&Path>) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        // Priority 2: Environment variable
        if let Some(path) = std::env::var_os(DATABASE_ENV_VAR) {
            return PathBuf::from(path);
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.database_path {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        default_database_path()
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// No file found; built-in defaults
    Defaults,
}

impl ConfigSource {
    /// Log the source at startup
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config file: {}", path.display()),
            ConfigSource::Defaults => warn!("No config file found, using built-in defaults"),
        }
    }
}

/// Default config file location for the platform
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wtf-dial").join("config.toml"))
}

/// Get OS-dependent default database path
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wtf-dial"))
        .unwrap_or_else(|| PathBuf::from("./wtf_data"))
        .join("wtf.db")
}
