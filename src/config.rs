//! Configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. built-in defaults
//! 2. a TOML file (`config/zio.toml` by default)
//! 3. environment variables prefixed with `RUST_ZIO_`, nested keys separated
//!    by `__` (for example `RUST_ZIO_PATHS__SYS_ROOT=/tmp/zio`)
//!
//! # Example
//! ```no_run
//! use rust_zio::config::ZioConfig;
//!
//! let config = ZioConfig::load()?;
//! config.validate()?;
//! println!("sysfs root: {}", config.paths.sys_root.display());
//! # Ok::<(), rust_zio::ZioError>(())
//! ```

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use zio_sys::sysfs::{DEFAULT_DEV_ROOT, DEFAULT_SYS_ROOT};
use zio_sys::SysfsStore;

use crate::error::{Result, ZioError};

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/zio.toml";
/// Environment prefix.
pub const ENV_PREFIX: &str = "RUST_ZIO_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZioConfig {
    /// `[paths]` section
    #[serde(default)]
    pub paths: PathsConfig,
    /// `[logging]` section
    #[serde(default)]
    pub logging: LoggingConfig,
    /// `[acquisition]` section
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
}

/// Where the backend looks for the bus and the char devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the ZIO bus (`devices/`, `available_*`)
    #[serde(default = "default_sys_root")]
    pub sys_root: PathBuf,
    /// Directory of the channel char devices
    #[serde(default = "default_dev_root")]
    pub dev_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sys_root: default_sys_root(),
            dev_root: default_dev_root(),
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    #[serde(default = "default_level")]
    pub level: String,
    /// pretty, compact or json
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// Defaults for acquisition runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Sweeps per run; unset runs until stopped
    #[serde(default)]
    pub max_sweeps: Option<u64>,
    /// Pause between sweeps in milliseconds
    #[serde(default)]
    pub idle_backoff_ms: u64,
}

fn default_sys_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYS_ROOT)
}

fn default_dev_root() -> PathBuf {
    PathBuf::from(DEFAULT_DEV_ROOT)
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl ZioConfig {
    /// Load from the default file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path` and the environment. A missing file is not an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::figment(path.as_ref()).extract().map_err(ZioError::from)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ZioConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject unknown log levels/formats and empty paths.
    pub fn validate(&self) -> Result<()> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ZioError::InvalidConfig {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        let format = self.logging.format.to_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            return Err(ZioError::InvalidConfig {
                message: format!(
                    "Invalid log format '{}'. Must be one of: {}",
                    self.logging.format,
                    LOG_FORMATS.join(", ")
                ),
            });
        }

        for (key, path) in [
            ("paths.sys_root", &self.paths.sys_root),
            ("paths.dev_root", &self.paths.dev_root),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ZioError::InvalidConfig {
                    message: format!("{key} must not be empty"),
                });
            }
        }

        Ok(())
    }

    /// A sysfs backend over the configured roots.
    pub fn sysfs_store(&self) -> SysfsStore {
        SysfsStore::new(&self.paths.sys_root, &self.paths.dev_root)
    }
}
