//! Jira RTL configuration and settings
//!
//! Two layers live here:
//! - [`JiraRtlConfig`]: static engine configuration loaded from
//!   `jira-rtl.toml`, with environment variable overrides.
//! - [`ExtensionSettings`]: user-facing settings persisted through a
//!   [`SettingsStore`] and toggled at runtime.

mod error;
pub mod settings;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use error::{ConfigError, SettingsError};
pub use settings::{
    ExtensionSettings, FileSettingsStore, MemorySettingsStore, SETTINGS_KEY, SettingChange,
    SettingsStore,
};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "jira-rtl.toml";

/// Main configuration structure for the direction engine
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct JiraRtlConfig {
    /// Rule matching and annotation settings
    pub engine: EngineConfig,
    /// Client-side navigation detection
    pub navigation: NavigationConfig,
    /// Startup behaviour
    pub lifecycle: LifecycleConfig,
    /// Persisted user settings
    pub settings: SettingsConfig,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Attribute set to `"true"` on every annotated element
    pub marker_attribute: String,
    /// Rule file to load instead of the built-in Jira rules
    pub rules_path: Option<PathBuf>,
    /// Descendants skipped by tree-walker text resolution when a rule does
    /// not name its own exclusions
    pub tree_walker_exclude: String,
}

/// Navigation watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Quiet period before a URL change is reported
    pub debounce_ms: u64,
}

/// Lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Delay of the one-off rescan after page load, for late-rendered content
    pub post_load_scan_ms: u64,
}

/// Settings storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SettingsConfig {
    /// Settings file; `~/.jira-rtl/settings.json` when unset
    pub path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marker_attribute: "data-jira-rtl-applied".to_string(),
            rules_path: None,
            tree_walker_exclude: "pre, code".to_string(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            post_load_scan_ms: 4000,
        }
    }
}

impl JiraRtlConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `jira-rtl.toml` from the current directory, or defaults if it is
    /// missing or invalid
    pub fn load_or_default() -> Self {
        match Self::load_from_file(CONFIG_FILE) {
            Ok(config) => config,
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(error) => {
                tracing::warn!(%error, "ignoring config file");
                Self::default()
            }
        }
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Ok(attr) = std::env::var("JIRA_RTL_MARKER_ATTRIBUTE")
            && !attr.trim().is_empty()
        {
            self.engine.marker_attribute = attr.trim().to_string();
        }
        if let Ok(path) = std::env::var("JIRA_RTL_RULES_PATH") {
            self.engine.rules_path = Some(PathBuf::from(path));
        }

        if let Ok(val) = std::env::var("JIRA_RTL_NAVIGATION_DEBOUNCE_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.navigation.debounce_ms = ms;
        }

        if let Ok(val) = std::env::var("JIRA_RTL_POST_LOAD_SCAN_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.lifecycle.post_load_scan_ms = ms;
        }

        if let Ok(path) = std::env::var("JIRA_RTL_SETTINGS_PATH") {
            self.settings.path = Some(PathBuf::from(path));
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from jira-rtl.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}
