//! Fallbacks used when the crate is built without Bluetooth support.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScanError;

use super::{connection::Connector, device::DeviceCandidate, scanner::DiscoveryBackend};

/// Host without a discovery capability: every scan fails immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

#[async_trait]
impl DiscoveryBackend for UnavailableBackend {
    async fn availability(&self) -> Result<(), ScanError> {
        Err(ScanError::ScannerUnavailable)
    }

    async fn discover(&self, _window: Duration) -> Result<Vec<DeviceCandidate>, ScanError> {
        Err(ScanError::ScannerUnavailable)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedConnector;

#[async_trait]
impl Connector for UnsupportedConnector {
    async fn connect(&self, _device: &DeviceCandidate) -> Result<(), String> {
        Err("Bluetooth connections are not supported in this build".into())
    }

    async fn disconnect(&self, _device: &DeviceCandidate) -> Result<(), String> {
        Ok(())
    }
}
