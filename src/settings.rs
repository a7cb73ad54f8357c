use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::SyncError;

/// Client preferences that survive a restart. The access token is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PersistentSettings {
    pub widget_poll_interval_ms: Option<u64>,
    pub service_workflow_poll_interval_ms: Option<u64>,
    pub theme: Option<String>,
}

pub fn load_settings(path: &Path) -> PersistentSettings {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings file {:?}: {}", path, e);
            PersistentSettings::default()
        }),
        Err(_) => PersistentSettings::default(),
    }
}

pub fn save_settings(path: &Path, settings: &PersistentSettings) {
    if let Err(e) = write_settings(path, settings) {
        warn!("Failed to save settings to {:?}: {}", path, e);
    }
}

fn write_settings(path: &Path, settings: &PersistentSettings) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}
