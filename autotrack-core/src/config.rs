//! Configuration file loading
//!
//! Configuration is loaded from `~/.config/autotrack/config.toml` and turned
//! into [`ConfigOverrides`] for the pipeline's store.
//!
//! Paths follow the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/autotrack/` (~/.config/autotrack/)
//! - State/Logs: `$XDG_STATE_HOME/autotrack/` (~/.local/state/autotrack/)
//!
//! ```toml
//! [tracking]
//! debug_mode = true
//!
//! [[platforms]]
//! kind = "file"
//! name = "local"
//! path = "/tmp/events.jsonl"
//!
//! [[rules]]
//! selector = "button.buy"
//! event_type = "click"
//! event_name = "purchase_started"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::platform::{ConsolePlatform, FilePlatform, HttpPlatform, HttpPlatformConfig, Platform};
use crate::rules::{Rule, RuleSpec};
use crate::store::{ConfigOverrides, DEFAULT_SESSION_TIMEOUT};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Platforms to deliver to, in registration order
    #[serde(default)]
    pub platforms: Vec<PlatformSpec>,

    /// Replaces the default rule set when present
    #[serde(default)]
    pub rules: Option<Vec<RuleSpec>>,
}

/// Tracking flags
#[derive(Debug, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enable_auto_tracking: bool,

    /// Log every synthesized event at info level
    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enable_auto_tracking: true,
            debug_mode: false,
            session_timeout_ms: default_session_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT.as_millis() as u64
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// One `[[platforms]]` entry, tagged by `kind`.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformSpec {
    Console {
        #[serde(default = "default_console_name")]
        name: String,
    },
    File {
        name: String,
        path: PathBuf,
    },
    Http {
        name: String,
        #[serde(flatten)]
        config: HttpPlatformConfig,
    },
}

fn default_console_name() -> String {
    "console".to_string()
}

impl PlatformSpec {
    pub fn name(&self) -> &str {
        match self {
            PlatformSpec::Console { name }
            | PlatformSpec::File { name, .. }
            | PlatformSpec::Http { name, .. } => name,
        }
    }

    /// Construct the platform this entry describes.
    pub fn build(&self) -> Result<Arc<dyn Platform>> {
        let platform: Arc<dyn Platform> = match self {
            PlatformSpec::Console { name } => Arc::new(ConsolePlatform::new(name.clone())),
            PlatformSpec::File { name, path } => Arc::new(FilePlatform::open(name.clone(), path)?),
            PlatformSpec::Http { name, config } => {
                Arc::new(HttpPlatform::new(name.clone(), config.clone())?)
            }
        };
        Ok(platform)
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Rules from the file, or `None` to keep the defaults.
    pub fn rules(&self) -> Option<Vec<Rule>> {
        self.rules
            .as_ref()
            .map(|specs| specs.iter().cloned().map(Rule::from).collect())
    }

    /// Build every configured platform and collect the store overrides.
    pub fn to_overrides(&self) -> Result<ConfigOverrides> {
        let mut overrides = ConfigOverrides::default()
            .enable_auto_tracking(self.tracking.enable_auto_tracking)
            .debug_mode(self.tracking.debug_mode)
            .session_timeout(Duration::from_millis(self.tracking.session_timeout_ms));

        for spec in &self.platforms {
            overrides = overrides.platform(spec.build()?);
        }
        if let Some(rules) = self.rules() {
            overrides = overrides.rules(rules);
        }
        Ok(overrides)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/autotrack/config.toml` (~/.config/autotrack/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("autotrack").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/autotrack/` (~/.local/state/autotrack/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("autotrack")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("autotrack.log")
    }

    /// Ensure XDG base directory environment variables are set.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
