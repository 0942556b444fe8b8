use std::{
    future::Future,
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};

use crate::error::ScanError;

use super::device::{rank, DeviceCandidate};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Time reserved at the end of a scan window for the backend to stop
/// scanning and report its results.
const TEARDOWN_GRACE: Duration = Duration::from_millis(250);

/// Host-side discovery mechanism.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    /// Resolves quickly; reports `ScannerUnavailable` or `NoAdapter` when the
    /// host cannot scan at all.
    async fn availability(&self) -> Result<(), ScanError>;

    /// Listens for up to `window` and returns every sighting. An empty vector
    /// means the scan completed and nothing answered.
    async fn discover(&self, window: Duration) -> Result<Vec<DeviceCandidate>, ScanError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    pub timeout: Duration,
    /// Case-insensitive substring matched against the display name.
    pub name_filter: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCAN_TIMEOUT,
            name_filter: None,
        }
    }
}

impl ScanOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

fn listen_window(timeout: Duration) -> Duration {
    timeout.saturating_sub(TEARDOWN_GRACE.min(timeout / 2))
}

/// Time a backend may spend collecting results once its listen window has
/// ended. Kept below the teardown grace so the outer deadline never fires
/// on a backend that stops collecting on time.
#[cfg_attr(not(feature = "ble"), allow(dead_code))]
pub(crate) fn collect_budget(window: Duration) -> Duration {
    TEARDOWN_GRACE.min(window) * 4 / 5
}

/// Awaits `lookups` in order until `deadline` and keeps every sighting
/// gathered so far. The lookup still pending at the deadline is dropped
/// along with the ones after it.
#[cfg_attr(not(feature = "ble"), allow(dead_code))]
pub(crate) async fn gather_until<T, F>(
    deadline: Instant,
    lookups: impl IntoIterator<Item = F>,
) -> Vec<T>
where
    F: Future<Output = Option<T>>,
{
    let mut gathered = Vec::new();
    for lookup in lookups {
        match time::timeout_at(deadline, lookup).await {
            Ok(Some(item)) => gathered.push(item),
            Ok(None) => {}
            Err(_) => {
                log_warn!(
                    "Result collection hit its deadline; keeping {} sighting(s)",
                    gathered.len()
                );
                break;
            }
        }
    }
    gathered
}

fn matches_filter(candidate: &DeviceCandidate, filter: &str) -> bool {
    let needle = filter.to_lowercase();
    candidate
        .display_name
        .as_deref()
        .map(|name| name.to_lowercase().contains(&needle))
        .unwrap_or(false)
}

/// Runs time-bounded discovery scans and remembers the latest result set.
#[derive(Clone)]
pub struct DeviceScanner {
    backend: Arc<dyn DiscoveryBackend>,
    latest: Arc<RwLock<Vec<DeviceCandidate>>>,
}

impl DeviceScanner {
    pub fn new(backend: Arc<dyn DiscoveryBackend>) -> Self {
        Self {
            backend,
            latest: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Scans for nearby devices, strongest signal first.
    ///
    /// Capability errors are reported before any waiting happens. The
    /// latest result set is only replaced by a scan that succeeds.
    pub async fn scan(&self, options: &ScanOptions) -> Result<Vec<DeviceCandidate>, ScanError> {
        let timeout_ms = options.timeout.as_millis() as u64;
        let deadline = Instant::now() + options.timeout;

        match time::timeout_at(deadline, self.backend.availability()).await {
            Ok(result) => result?,
            Err(_) => return Err(ScanError::Timeout(timeout_ms)),
        }

        log_info!("Starting device scan ({timeout_ms} ms)");

        let window = listen_window(options.timeout);
        let sightings = match time::timeout_at(deadline, self.backend.discover(window)).await {
            Ok(result) => result?,
            Err(_) => {
                log_warn!("Device scan timed out after {timeout_ms} ms");
                return Err(ScanError::Timeout(timeout_ms));
            }
        };

        let mut candidates = rank(sightings);
        if let Some(filter) = options.name_filter.as_deref().filter(|f| !f.trim().is_empty()) {
            candidates.retain(|candidate| matches_filter(candidate, filter.trim()));
        }

        log_info!("Device scan found {} candidate(s)", candidates.len());

        match self.latest.write() {
            Ok(mut guard) => *guard = candidates.clone(),
            Err(poisoned) => *poisoned.into_inner() = candidates.clone(),
        }

        Ok(candidates)
    }

    /// Candidates from the most recent successful scan.
    pub fn latest(&self) -> Vec<DeviceCandidate> {
        match self.latest.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn find(&self, device_id: &str) -> Option<DeviceCandidate> {
        self.latest().into_iter().find(|candidate| candidate.id == device_id)
    }
}
