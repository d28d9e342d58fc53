use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};
use tokio::sync::watch;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Persisted user preferences. Only the `enabled` switch is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct UserSettings {
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

/// JSON-file backed preference store with change notification.
///
/// Consumers never read the store directly: they hold a `watch::Receiver`
/// obtained from [`SettingsStore::subscribe`].
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
    enabled_tx: watch::Sender<bool>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        let (enabled_tx, _) = watch::channel(data.enabled);
        Ok(Self {
            path,
            data: RwLock::new(data),
            enabled_tx,
        })
    }

    pub fn enabled(&self) -> bool {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled
    }

    /// Current value plus every later change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.enabled_tx.subscribe()
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
            guard.enabled = enabled;
            self.persist(&guard)?;
        }
        self.notify(enabled);
        Ok(())
    }

    /// Re-read the file, e.g. after another process changed it.
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        let enabled = data.enabled;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        self.notify(enabled);
        Ok(())
    }

    fn notify(&self, enabled: bool) {
        let changed = self.enabled_tx.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });
        if changed {
            log_info!("Enabled state changed to: {}", enabled);
        }
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
