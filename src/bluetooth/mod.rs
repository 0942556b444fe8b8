mod backend;
#[cfg(feature = "ble")]
mod btle;
pub mod connection;
pub mod device;
pub mod scanner;

use std::sync::Arc;

pub use backend::{UnavailableBackend, UnsupportedConnector};
#[cfg(feature = "ble")]
pub use btle::{BtleplugBackend, BtleplugConnector};
pub use connection::{
    candidate_views, is_disabled, CandidateView, ConnectionManager, ConnectionState, Connector,
};
pub use device::{DeviceCandidate, SignalQuality};
pub use scanner::{DeviceScanner, DiscoveryBackend, ScanOptions, DEFAULT_SCAN_TIMEOUT};

/// Backends for this build: btleplug when compiled with `ble`, otherwise
/// stand-ins that report the capability as missing.
pub fn platform_backends() -> (Arc<dyn DiscoveryBackend>, Arc<dyn Connector>) {
    #[cfg(feature = "ble")]
    {
        (Arc::new(BtleplugBackend), Arc::new(BtleplugConnector))
    }

    #[cfg(not(feature = "ble"))]
    {
        (Arc::new(UnavailableBackend), Arc::new(UnsupportedConnector))
    }
}
