#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use emotion_tracker_lib::{
    bluetooth::{Connector, DeviceCandidate, DiscoveryBackend},
    db::{Clock, Database},
    error::ScanError,
};

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }

    pub fn current(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.current()
    }
}

pub fn open_db(dir: &tempfile::TempDir, clock: Arc<ManualClock>) -> Database {
    Database::open_with_clock(dir.path().join("emotion_tracker.sqlite3"), clock)
        .expect("open database")
}

pub fn candidate(id: &str, name: Option<&str>, rssi: i16) -> DeviceCandidate {
    DeviceCandidate {
        id: id.into(),
        display_name: name.map(str::to_string),
        signal_strength: rssi,
        discovered_at: Utc::now(),
    }
}

/// Backend that reports whatever sightings it currently holds.
pub struct FixedBackend {
    sightings: Mutex<Vec<DeviceCandidate>>,
}

impl FixedBackend {
    pub fn new(sightings: Vec<DeviceCandidate>) -> Arc<Self> {
        Arc::new(Self {
            sightings: Mutex::new(sightings),
        })
    }

    pub fn replace(&self, sightings: Vec<DeviceCandidate>) {
        *self.sightings.lock().unwrap() = sightings;
    }
}

#[async_trait]
impl DiscoveryBackend for FixedBackend {
    async fn availability(&self) -> Result<(), ScanError> {
        Ok(())
    }

    async fn discover(&self, _window: Duration) -> Result<Vec<DeviceCandidate>, ScanError> {
        Ok(self.sightings.lock().unwrap().clone())
    }
}

/// Connector that fails for the listed ids and records disconnects.
#[derive(Default)]
pub struct ScriptedConnector {
    pub failing: HashSet<String>,
    pub disconnected: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, device: &DeviceCandidate) -> Result<(), String> {
        if self.failing.contains(&device.id) {
            Err(format!("{} refused the connection", device.id))
        } else {
            Ok(())
        }
    }

    async fn disconnect(&self, device: &DeviceCandidate) -> Result<(), String> {
        self.disconnected.lock().unwrap().push(device.id.clone());
        Ok(())
    }
}
