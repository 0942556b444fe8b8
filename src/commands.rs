//! UI-facing operations.
//!
//! Every command returns `Result<T, String>` so the presentation layer can
//! show the error message verbatim.

use std::time::Duration;

use crate::{
    bluetooth::{candidate_views, CandidateView, ConnectionState},
    db::{Alert, NewAlert, NewReading, Reading},
    error::ConnectError,
    monitor::Recorded,
    AppState,
};

pub async fn scan_devices(
    state: &AppState,
    timeout_ms: Option<u64>,
) -> Result<Vec<CandidateView>, String> {
    let mut options = state.settings.get().scan_options();
    if let Some(ms) = timeout_ms {
        options.timeout = Duration::from_millis(ms);
    }

    let candidates = state
        .scanner
        .scan(&options)
        .await
        .map_err(|e| e.to_string())?;
    Ok(candidate_views(&candidates, &state.connection.current_state()))
}

/// The latest scan result set with the current `disabled` derivation.
pub fn get_candidates(state: &AppState) -> Vec<CandidateView> {
    candidate_views(&state.scanner.latest(), &state.connection.current_state())
}

pub async fn connect_device(state: &AppState, device_id: String) -> Result<ConnectionState, String> {
    // A connected peripheral usually stops advertising, so the slot is
    // checked before the latest scan is consulted.
    if let Some(settled) = state
        .connection
        .settled(&device_id)
        .map_err(|e| e.to_string())?
    {
        return Ok(settled);
    }

    let device = match state.scanner.find(&device_id) {
        Some(device) => device,
        None => {
            return match state.connection.current_state() {
                current @ ConnectionState::Connecting { .. }
                    if current.device_id() == Some(device_id.as_str()) =>
                {
                    Ok(current)
                }
                _ => Err(ConnectError::UnknownDevice(device_id).to_string()),
            };
        }
    };

    state
        .connection
        .connect(device)
        .await
        .map_err(|e| e.to_string())
}

pub async fn disconnect_device(state: &AppState) -> Result<(), String> {
    state.connection.disconnect().await;
    Ok(())
}

pub fn acknowledge_connection_failure(state: &AppState) -> ConnectionState {
    state.connection.acknowledge_failure()
}

pub fn get_connection_state(state: &AppState) -> ConnectionState {
    state.connection.current_state()
}

pub async fn get_recent_readings(
    state: &AppState,
    limit: Option<usize>,
) -> Result<Vec<Reading>, String> {
    let limit = limit.unwrap_or(state.settings.get().recent_limit);
    state
        .db
        .recent_readings(Some(limit))
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_recent_alerts(state: &AppState, limit: Option<usize>) -> Result<Vec<Alert>, String> {
    let limit = limit.unwrap_or(state.settings.get().recent_limit);
    state
        .db
        .recent_alerts(Some(limit))
        .await
        .map_err(|e| e.to_string())
}

pub async fn acknowledge_alert(state: &AppState, alert_id: i64) -> Result<(), String> {
    state
        .db
        .acknowledge_alert(alert_id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn record_reading(
    state: &AppState,
    emotion: String,
    confidence: f64,
    steps: u64,
) -> Result<Recorded, String> {
    state
        .recorder
        .record(NewReading::new(emotion, confidence, steps))
        .await
        .map_err(|e| e.to_string())
}

pub async fn add_alert(state: &AppState, kind: String, message: String) -> Result<i64, String> {
    state
        .db
        .add_alert(NewAlert::new(kind, message))
        .await
        .map_err(|e| e.to_string())
}
