//! Layered configuration
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`craftscript.toml` in the working directory, or an
//!    explicit path which must then exist)
//! 3. `CRAFTSCRIPT_*` environment variables, sections separated by `__`
//!    (e.g. `CRAFTSCRIPT_EXECUTOR__OP_LIMIT=500`), after loading `.env`
//! 4. builder overrides

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::executor::ExecutorOptions;

const DEFAULT_CONFIG_FILE: &str = "craftscript.toml";
const ENV_PREFIX: &str = "CRAFTSCRIPT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/* ===================== Sections ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub op_limit: usize,
    pub default_scan_radius: i32,
    pub max_scan_radius: i32,
    pub reach: f64,
    pub auto_scan: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let options = ExecutorOptions::default();
        Self {
            op_limit: options.op_limit,
            default_scan_radius: options.default_scan_radius,
            max_scan_radius: options.max_scan_radius,
            reach: options.reach,
            auto_scan: options.auto_scan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub timeout_ms: u64,
    pub default_tolerance: i32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            default_tolerance: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub event_capacity: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            event_capacity: crate::jobs::DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointsConfig {
    pub directory: PathBuf,
    pub bot: String,
}

impl Default for WaypointsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            bot: "bot".to_string(),
        }
    }
}

/* ===================== Config ===================== */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub navigation: NavigationConfig,
    pub jobs: JobsConfig,
    pub waypoints: WaypointsConfig,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            op_limit: self.executor.op_limit,
            default_scan_radius: self.executor.default_scan_radius,
            max_scan_radius: self.executor.max_scan_radius,
            reach: self.executor.reach,
            auto_scan: self.executor.auto_scan,
            nav_timeout: self.nav_timeout(),
            default_tolerance: self.navigation.default_tolerance,
        }
    }

    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.op_limit == 0 {
            return Err(ConfigError::Invalid("executor.op_limit must be positive".into()));
        }
        if self.executor.max_scan_radius < 0 || self.executor.default_scan_radius < 0 {
            return Err(ConfigError::Invalid("scan radii must not be negative".into()));
        }
        if !(self.executor.reach.is_finite() && self.executor.reach > 0.0) {
            return Err(ConfigError::Invalid("executor.reach must be positive".into()));
        }
        if self.navigation.default_tolerance < 0 {
            return Err(ConfigError::Invalid(
                "navigation.default_tolerance must not be negative".into(),
            ));
        }
        if self.jobs.event_capacity == 0 {
            return Err(ConfigError::Invalid("jobs.event_capacity must be positive".into()));
        }
        Ok(())
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    op_limit: Option<usize>,
    waypoints_dir: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Explicit config file, replacing the default search
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn op_limit(mut self, op_limit: Option<usize>) -> Self {
        self.op_limit = op_limit;
        self
    }

    pub fn waypoints_dir(mut self, directory: Option<PathBuf>) -> Self {
        self.waypoints_dir = directory;
        self
    }

    /// Ignore `.env` and `CRAFTSCRIPT_*` variables
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let file = match &self.config_path {
            Some(path) => config::File::from(path.as_path()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut sources = config::Config::builder().add_source(file);
        if !self.skip_env {
            // a missing .env is the common case
            let _ = dotenvy::dotenv();
            sources = sources.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut config: Config = sources.build()?.try_deserialize()?;

        if let Some(op_limit) = self.op_limit {
            config.executor.op_limit = op_limit;
        }
        if let Some(directory) = self.waypoints_dir {
            config.waypoints.directory = directory;
        }

        config.validate()?;
        debug!(
            path = ?self.config_path,
            op_limit = config.executor.op_limit,
            nav_timeout_ms = config.navigation.timeout_ms,
            "Configuration loaded"
        );
        Ok(config)
    }
}
