pub mod bluetooth;
pub mod commands;
pub mod db;
pub mod error;
pub mod monitor;
pub mod settings;
mod utils;

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use log::{info, warn};

use bluetooth::{platform_backends, ConnectionManager, Connector, DeviceScanner, DiscoveryBackend};
use db::{Collection, Database};
use monitor::{ChangeDetector, ReadingRecorder};
use settings::SettingsStore;

pub const DATA_DIR_ENV: &str = "EMOTION_TRACKER_DATA_DIR";
const DB_FILE_NAME: &str = "emotion_tracker.sqlite3";
const SETTINGS_FILE_NAME: &str = "settings.json";

pub struct AppState {
    pub db: Database,
    pub scanner: DeviceScanner,
    pub connection: ConnectionManager,
    pub recorder: ReadingRecorder,
    pub settings: SettingsStore,
}

impl AppState {
    pub fn new(
        db: Database,
        backend: Arc<dyn DiscoveryBackend>,
        connector: Arc<dyn Connector>,
        settings: SettingsStore,
    ) -> Self {
        let detector = ChangeDetector::new(settings.get().change_thresholds());
        Self {
            recorder: ReadingRecorder::new(db.clone(), detector),
            scanner: DeviceScanner::new(backend),
            connection: ConnectionManager::new(connector),
            db,
            settings,
        }
    }

    /// Opens the store and settings under `data_dir` with this build's
    /// Bluetooth backends.
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let db = Database::open(data_dir.join(DB_FILE_NAME))
            .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE_NAME))?;
        let (backend, connector) = platform_backends();

        Ok(Self::new(db, backend, connector, settings))
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("emotion-tracker"))
        .context("No platform data directory; set EMOTION_TRACKER_DATA_DIR")
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Emotion tracker starting up...");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let data_dir = default_data_dir()?;
    let state = AppState::open(&data_dir)?;
    info!("Store opened at {}", state.db.path().display());

    runtime.block_on(async {
        let options = state.settings.get().scan_options();
        match state.scanner.scan(&options).await {
            Ok(candidates) if candidates.is_empty() => info!("No devices found"),
            Ok(candidates) => {
                for candidate in &candidates {
                    info!(
                        "{} ({}) signal {} dBm, {}",
                        candidate.label(),
                        candidate.id,
                        candidate.signal_strength,
                        candidate.quality()
                    );
                }
            }
            Err(err) => warn!("Device scan failed: {err}"),
        }

        let limit = Some(state.settings.get().recent_limit);
        for collection in [Collection::Readings, Collection::Alerts] {
            let recent = state
                .db
                .recent(collection, limit)
                .await
                .with_context(|| format!("Failed to load recent {collection}"))?;
            info!("{} recent {collection}", recent.len());
        }

        Ok::<(), anyhow::Error>(())
    })?;

    info!("Connection state: {:?}", state.connection.current_state());
    Ok(())
}
