//! Configuration store
//!
//! Holds the live pipeline configuration: platforms, rules and tracking
//! flags. A configuration is built by shallow-merging caller overrides onto
//! the defaults; any key present in the overrides replaces the default value
//! wholesale (lists are not concatenated).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::platform::Platform;
use crate::rules::{default_rules, Rule};

/// Default inactivity window for a session (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Effective pipeline configuration.
#[derive(Clone)]
pub struct Configuration {
    pub platforms: Vec<Arc<dyn Platform>>,
    pub rules: Vec<Rule>,
    pub session_timeout: Duration,
    pub enable_auto_tracking: bool,
    pub debug_mode: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            rules: default_rules(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            enable_auto_tracking: true,
            debug_mode: false,
        }
    }
}

impl Configuration {
    /// Apply `overrides` on top of `self`, key by key.
    pub fn merged(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(platforms) = overrides.platforms {
            self.platforms = platforms;
        }
        if let Some(rules) = overrides.rules {
            self.rules = rules;
        }
        if let Some(timeout) = overrides.session_timeout {
            self.session_timeout = timeout;
        }
        if let Some(enabled) = overrides.enable_auto_tracking {
            self.enable_auto_tracking = enabled;
        }
        if let Some(debug) = overrides.debug_mode {
            self.debug_mode = debug;
        }
        self
    }

    pub fn platform_names(&self) -> Vec<&str> {
        self.platforms.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("platforms", &self.platform_names())
            .field("rules", &self.rules)
            .field("session_timeout", &self.session_timeout)
            .field("enable_auto_tracking", &self.enable_auto_tracking)
            .field("debug_mode", &self.debug_mode)
            .finish()
    }
}

/// Caller-supplied configuration; `None` keeps the default.
#[derive(Clone, Default)]
pub struct ConfigOverrides {
    pub platforms: Option<Vec<Arc<dyn Platform>>>,
    pub rules: Option<Vec<Rule>>,
    pub session_timeout: Option<Duration>,
    pub enable_auto_tracking: Option<bool>,
    pub debug_mode: Option<bool>,
}

impl ConfigOverrides {
    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platforms.get_or_insert_with(Vec::new).push(platform);
        self
    }

    pub fn rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    pub fn enable_auto_tracking(mut self, enabled: bool) -> Self {
        self.enable_auto_tracking = Some(enabled);
        self
    }

    pub fn debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = Some(debug);
        self
    }
}

/// Thread-safe holder of the live [`Configuration`].
#[derive(Debug)]
pub struct ConfigStore {
    config: RwLock<Configuration>,
}

impl ConfigStore {
    /// Merge `overrides` onto the default configuration.
    pub fn build(overrides: ConfigOverrides) -> Self {
        Self {
            config: RwLock::new(Configuration::default().merged(overrides)),
        }
    }

    /// Copy of the current configuration. Mutating it does not affect the store.
    pub fn get_config(&self) -> Configuration {
        self.config.read().clone()
    }

    /// Shallow-merge `overrides` onto the live configuration.
    pub fn update(&self, overrides: ConfigOverrides) {
        let mut config = self.config.write();
        let current = std::mem::take(&mut *config);
        *config = current.merged(overrides);
    }

    /// Whether the pipeline may start: at least one platform and one rule.
    pub fn validate(&self) -> bool {
        let config = self.config.read();
        let mut valid = true;
        if config.platforms.is_empty() {
            tracing::warn!("No analytics platforms configured");
            valid = false;
        }
        if config.rules.is_empty() {
            tracing::warn!("No event rules configured");
            valid = false;
        }
        valid
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.config.read().rules.clone()
    }

    pub fn debug_mode(&self) -> bool {
        self.config.read().debug_mode
    }

    pub fn enable_auto_tracking(&self) -> bool {
        self.config.read().enable_auto_tracking
    }

    pub fn add_rule(&self, rule: Rule) {
        self.config.write().rules.push(rule);
    }

    /// Remove every rule producing `event_name`. No-op when none does.
    pub fn remove_rule(&self, event_name: &str) {
        self.config
            .write()
            .rules
            .retain(|rule| rule.event_name != event_name);
    }

    pub fn add_platform(&self, platform: Arc<dyn Platform>) {
        self.config.write().platforms.push(platform);
    }

    /// Remove every platform registered as `name`. No-op when none is.
    pub fn remove_platform(&self, name: &str) {
        self.config
            .write()
            .platforms
            .retain(|platform| platform.name() != name);
    }
}
