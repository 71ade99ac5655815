//! Layered configuration for the viewer.
//!
//! Sources, later ones win:
//! - Default values
//! - `.mdlive/settings.toml` (nearest ancestor of the current directory)
//! - Environment variables
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `MDLIVE_` and use double
//! underscores to separate nested levels:
//! - `MDLIVE_HOST=browser` sets `host`
//! - `MDLIVE_WATCH__POLL_INTERVAL_MS=500` sets `watch.poll_interval_ms`
//! - `MDLIVE_LOGGING__DEFAULT=debug` sets `logging.default`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::platform::HostKind;
use crate::types::{MAX_WATCH_WINDOW, PickerFilter, WatchOptions};

pub const CONFIG_DIR: &str = ".mdlive";
pub const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "MDLIVE_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Host strategy used by the CLI
    #[serde(default)]
    pub host: HostKind,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Filter offered by file pickers
    #[serde(default)]
    pub picker: PickerFilter,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Polling interval for hosts without change events
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Quiet period before an OS change event is acted on
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Minimum age of the last write before the desktop host reads a file
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Drop notifications whose content matches the last delivered content
    #[serde(default = "default_true")]
    pub skip_unchanged_content: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Whether the sandboxed host hands out capability handles
    #[serde(default = "default_true")]
    pub file_system_access: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `mdlive::watch = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_settle_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            host: HostKind::default(),
            watch: WatchConfig::default(),
            picker: PickerFilter::default(),
            browser: BrowserConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
            settle_ms: default_settle_ms(),
            skip_unchanged_content: true,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            file_system_access: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl WatchConfig {
    /// Per-watch options derived from these settings.
    pub fn options(&self) -> WatchOptions {
        WatchOptions::default()
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .debounce(Duration::from_millis(self.debounce_ms))
            .skip_unchanged_content(self.skip_unchanged_content)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms).min(MAX_WATCH_WINDOW)
    }

    /// Reject intervals a watch cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        let max_ms = MAX_WATCH_WINDOW.as_millis();
        if self.poll_interval_ms == 0 {
            return Err("watch.poll_interval_ms must be at least 1".to_string());
        }
        for (key, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("debounce_ms", self.debounce_ms),
            ("settle_ms", self.settle_ms),
        ] {
            if u128::from(value) > max_ms {
                return Err(format!("watch.{key} = {value} exceeds {max_ms}"));
            }
        }
        Ok(())
    }
}

fn env_overrides() -> Env {
    // Double underscore separates nesting; single underscore stays in the key
    Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(env_overrides())
            .extract::<Self>()
            .and_then(|settings| {
                settings.watch.validate()?;
                Ok(settings)
            })
            .map_err(Box::new)
    }

    /// Find `.mdlive/settings.toml` from the current directory up to root
    pub fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a default settings file under `dir`
    pub fn init_config_file(dir: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
