//! Bluetooth LE discovery and connection through `btleplug`.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use chrono::Utc;
use tokio::time::{self, Instant};

use crate::error::ScanError;

use super::{
    connection::Connector,
    device::DeviceCandidate,
    scanner::{collect_budget, gather_until, DiscoveryBackend},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

fn backend_error(err: btleplug::Error) -> ScanError {
    ScanError::Backend(err.to_string())
}

async fn first_adapter() -> Result<Adapter, ScanError> {
    let manager = Manager::new().await.map_err(|err| {
        log_warn!("Bluetooth manager unavailable: {err}");
        ScanError::ScannerUnavailable
    })?;
    let adapters = manager.adapters().await.map_err(backend_error)?;
    adapters.into_iter().next().ok_or(ScanError::NoAdapter)
}

/// Scans with the first adapter reported by the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct BtleplugBackend;

#[async_trait]
impl DiscoveryBackend for BtleplugBackend {
    async fn availability(&self) -> Result<(), ScanError> {
        first_adapter().await.map(|_| ())
    }

    async fn discover(&self, window: Duration) -> Result<Vec<DeviceCandidate>, ScanError> {
        let adapter = first_adapter().await?;
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(backend_error)?;
        time::sleep(window).await;

        // Everything after the listen window shares one budget; whatever is
        // collected by then is returned.
        let deadline = Instant::now() + collect_budget(window);
        match time::timeout_at(deadline, adapter.stop_scan()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log_warn!("Failed to stop BLE scan: {err}"),
            Err(_) => log_warn!("Stopping the BLE scan overran its budget"),
        }

        let peripherals = match time::timeout_at(deadline, adapter.peripherals()).await {
            Ok(result) => result.map_err(backend_error)?,
            Err(_) => {
                log_warn!("Listing peripherals overran the scan budget");
                return Ok(Vec::new());
            }
        };

        let sightings = gather_until(deadline, peripherals.iter().map(sighting)).await;
        log_info!("BLE scan saw {} advertising peripheral(s)", sightings.len());
        Ok(sightings)
    }
}

async fn sighting(peripheral: &Peripheral) -> Option<DeviceCandidate> {
    let properties = match peripheral.properties().await {
        Ok(Some(properties)) => properties,
        Ok(None) => return None,
        Err(err) => {
            log_warn!("Skipping peripheral {}: {err}", peripheral.address());
            return None;
        }
    };
    // Cached peripherals that did not advertise during this scan carry no
    // RSSI.
    let rssi = properties.rssi?;
    Some(DeviceCandidate {
        id: peripheral.address().to_string(),
        display_name: properties.local_name,
        signal_strength: rssi,
        discovered_at: Utc::now(),
    })
}

async fn find_peripheral(device: &DeviceCandidate) -> Result<Peripheral, String> {
    let adapter = first_adapter().await.map_err(|err| err.to_string())?;
    let peripherals = adapter.peripherals().await.map_err(|err| err.to_string())?;
    peripherals
        .into_iter()
        .find(|peripheral| peripheral.address().to_string() == device.id)
        .ok_or_else(|| format!("device {} is no longer in range", device.label()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BtleplugConnector;

#[async_trait]
impl Connector for BtleplugConnector {
    async fn connect(&self, device: &DeviceCandidate) -> Result<(), String> {
        let peripheral = find_peripheral(device).await?;
        peripheral.connect().await.map_err(|err| err.to_string())?;
        peripheral
            .discover_services()
            .await
            .map_err(|err| err.to_string())
    }

    async fn disconnect(&self, device: &DeviceCandidate) -> Result<(), String> {
        let peripheral = find_peripheral(device).await?;
        if peripheral.is_connected().await.unwrap_or(false) {
            peripheral.disconnect().await.map_err(|err| err.to_string())?;
        }
        Ok(())
    }
}
