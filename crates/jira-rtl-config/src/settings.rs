//! Persisted user settings.
//!
//! Settings are stored as one JSON object under [`SETTINGS_KEY`]; keys
//! missing from storage take their default value. Every store also publishes
//! each value saved through it on a `watch` channel, so running components
//! react to a toggle saved through the same store. Writes to the file from
//! outside are only seen by the next `load`.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{SettingsConfig, SettingsError};

/// Storage key the settings object lives under.
pub const SETTINGS_KEY: &str = "Jira_RTL_settings";

const APP_HOME_DIR: &str = ".jira-rtl";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionSettings {
    /// Whether annotation is active.
    pub enabled: bool,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A single setting whose value differs between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    Enabled(bool),
}

impl ExtensionSettings {
    /// Settings that changed going from `previous` to `self`, carrying the
    /// new value.
    pub fn changes_since(&self, previous: &Self) -> Vec<SettingChange> {
        let mut out = Vec::new();
        if self.enabled != previous.enabled {
            out.push(SettingChange::Enabled(self.enabled));
        }
        out
    }
}

/// Async key-value access to [`ExtensionSettings`].
#[allow(async_fn_in_trait)]
pub trait SettingsStore {
    /// Stored settings merged over defaults.
    async fn load(&self) -> Result<ExtensionSettings, SettingsError>;

    /// Persist `settings` and notify subscribers.
    async fn save(&self, settings: ExtensionSettings) -> Result<(), SettingsError>;

    /// Receiver that observes every saved value from now on.
    fn subscribe(&self) -> watch::Receiver<ExtensionSettings>;
}

/// In-process store.
#[derive(Debug)]
pub struct MemorySettingsStore {
    tx: watch::Sender<ExtensionSettings>,
}

impl MemorySettingsStore {
    pub fn new(initial: ExtensionSettings) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(ExtensionSettings::default())
    }
}

impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<ExtensionSettings, SettingsError> {
        Ok(*self.tx.borrow())
    }

    async fn save(&self, settings: ExtensionSettings) -> Result<(), SettingsError> {
        self.tx.send_replace(settings);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<ExtensionSettings> {
        self.tx.subscribe()
    }
}

/// JSON file store. The file holds an object keyed by storage key so other
/// entries written next to ours survive a save.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    tx: watch::Sender<ExtensionSettings>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (tx, _) = watch::channel(ExtensionSettings::default());
        Self {
            path: path.into(),
            tx,
        }
    }

    /// Store at the configured path, or `~/.jira-rtl/settings.json`.
    pub fn from_config(config: &SettingsConfig) -> Result<Self, SettingsError> {
        match &config.path {
            Some(path) => Ok(Self::new(path.clone())),
            None => Ok(Self::new(default_storage_path()?)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_object(&self) -> Option<Map<String, Value>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(error) => {
                if error.kind() != io::ErrorKind::NotFound {
                    warn!(?error, path = ?self.path, "failed to read settings file");
                }
                return None;
            }
        };
        match serde_json::from_slice::<Map<String, Value>>(&data) {
            Ok(object) => Some(object),
            Err(error) => {
                warn!(?error, path = ?self.path, "failed to parse settings file");
                None
            }
        }
    }

    fn io_error(&self, source: io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<ExtensionSettings, SettingsError> {
        let stored = self
            .read_object()
            .await
            .and_then(|mut object| object.remove(SETTINGS_KEY));
        let settings = match stored {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|error| {
                warn!(?error, path = ?self.path, "invalid stored settings; using defaults");
                ExtensionSettings::default()
            }),
            None => ExtensionSettings::default(),
        };
        Ok(settings)
    }

    async fn save(&self, settings: ExtensionSettings) -> Result<(), SettingsError> {
        let mut object = self.read_object().await.unwrap_or_default();
        object.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
        let json = serde_json::to_string_pretty(&object)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!(path = ?self.path, ?settings, "saved settings");

        self.tx.send_replace(settings);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<ExtensionSettings> {
        self.tx.subscribe()
    }
}

fn default_storage_path() -> Result<PathBuf, SettingsError> {
    if let Some(mut home) = dirs::home_dir() {
        home.push(APP_HOME_DIR);
        home.push(SETTINGS_FILE);
        Ok(home)
    } else {
        let mut cwd = std::env::current_dir().map_err(|_| SettingsError::NoStorageLocation)?;
        cwd.push(SETTINGS_FILE);
        Ok(cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings: ExtensionSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.enabled);
        let settings: ExtensionSettings =
            serde_json::from_str(r#"{"enabled": false, "theme": "dark"}"#).unwrap();
        assert!(!settings.enabled);
    }

    #[test]
    fn changes_since_reports_new_values() {
        let on = ExtensionSettings { enabled: true };
        let off = ExtensionSettings { enabled: false };
        assert_eq!(off.changes_since(&on), vec![SettingChange::Enabled(false)]);
        assert!(on.changes_since(&on).is_empty());
    }

    #[tokio::test]
    async fn memory_store_notifies_subscribers() {
        let store = MemorySettingsStore::default();
        let mut rx = store.subscribe();
        store
            .save(ExtensionSettings { enabled: false })
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().enabled);
        assert!(!store.load().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn file_store_round_trips_and_keeps_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"other": 1}"#).unwrap();

        let store = FileSettingsStore::new(&path);
        assert!(store.load().await.unwrap().enabled);
        store
            .save(ExtensionSettings { enabled: false })
            .await
            .unwrap();

        let reopened = FileSettingsStore::new(&path);
        assert!(!reopened.load().await.unwrap().enabled);
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["other"], 1);
        assert_eq!(raw[SETTINGS_KEY]["enabled"], false);
    }

    #[tokio::test]
    async fn file_store_publishes_only_its_own_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let store = FileSettingsStore::new(&path);
        let mut rx = store.subscribe();

        std::fs::write(&path, r#"{"Jira_RTL_settings": {"enabled": false}}"#).unwrap();
        assert!(!rx.has_changed().unwrap());
        assert!(!store.load().await.unwrap().enabled);

        store
            .save(ExtensionSettings { enabled: true })
            .await
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().enabled);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "not json").unwrap();
        let store = FileSettingsStore::new(&path);
        assert_eq!(store.load().await.unwrap(), ExtensionSettings::default());

        std::fs::write(&path, r#"{"Jira_RTL_settings": {"enabled": "yes"}}"#).unwrap();
        assert_eq!(store.load().await.unwrap(), ExtensionSettings::default());
    }

    #[test]
    fn configured_path_wins() {
        let config = SettingsConfig {
            path: Some(PathBuf::from("/tmp/rtl.json")),
        };
        let store = FileSettingsStore::from_config(&config).unwrap();
        assert_eq!(store.path(), Path::new("/tmp/rtl.json"));
    }
}
