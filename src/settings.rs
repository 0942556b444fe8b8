use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    bluetooth::{ScanOptions, DEFAULT_SCAN_TIMEOUT},
    db::DEFAULT_RECENT_LIMIT,
    monitor::{ChangeThresholds, CONFIDENCE_SWING_THRESHOLD, STEP_JUMP_THRESHOLD},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    pub scan_timeout_ms: u64,
    pub scan_name_filter: Option<String>,
    pub recent_limit: usize,
    pub step_jump_threshold: u64,
    pub confidence_swing_threshold: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT.as_millis() as u64,
            scan_name_filter: None,
            recent_limit: DEFAULT_RECENT_LIMIT,
            step_jump_threshold: STEP_JUMP_THRESHOLD,
            confidence_swing_threshold: CONFIDENCE_SWING_THRESHOLD,
        }
    }
}

impl TrackerSettings {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            timeout: Duration::from_millis(self.scan_timeout_ms),
            name_filter: self.scan_name_filter.clone(),
        }
    }

    pub fn change_thresholds(&self) -> ChangeThresholds {
        ChangeThresholds {
            step_jump: self.step_jump_threshold,
            confidence_swing: self.confidence_swing_threshold,
        }
    }
}

/// JSON-backed user settings. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<TrackerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                TrackerSettings::default()
            })
        } else {
            TrackerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> TrackerSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: TrackerSettings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &TrackerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
