use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::error::ConnectError;

use super::device::{DeviceCandidate, SignalQuality};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ConnectionState {
    Idle,
    #[serde(rename_all = "camelCase")]
    Connecting { device_id: String },
    Connected { device: DeviceCandidate },
    #[serde(rename_all = "camelCase")]
    Failed { device_id: String, reason: String },
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Idle
    }
}

impl ConnectionState {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            ConnectionState::Idle => None,
            ConnectionState::Connecting { device_id } => Some(device_id),
            ConnectionState::Connected { device } => Some(&device.id),
            ConnectionState::Failed { device_id, .. } => Some(device_id),
        }
    }

    /// True while a device is being connected or is connected.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting { .. } | ConnectionState::Connected { .. }
        )
    }
}

/// Whether `candidate_id` must be shown as non-connectable: another device
/// holds, or is acquiring, the single connection slot.
pub fn is_disabled(state: &ConnectionState, candidate_id: &str) -> bool {
    state.is_active() && state.device_id() != Some(candidate_id)
}

/// Display row for one candidate of the latest scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    #[serde(flatten)]
    pub candidate: DeviceCandidate,
    pub quality: SignalQuality,
    pub disabled: bool,
}

pub fn candidate_views(candidates: &[DeviceCandidate], state: &ConnectionState) -> Vec<CandidateView> {
    candidates
        .iter()
        .map(|candidate| CandidateView {
            quality: candidate.quality(),
            disabled: is_disabled(state, &candidate.id),
            candidate: candidate.clone(),
        })
        .collect()
}

/// Performs the hardware handshake for a single device.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, device: &DeviceCandidate) -> Result<(), String>;
    async fn disconnect(&self, device: &DeviceCandidate) -> Result<(), String>;
}

/// Owns the process-wide connection state.
///
/// At most one device is connecting or connected at a time. Connect
/// attempts are serialized through `transition`; the permit lives inside
/// the handshake task, so it is only released once the attempt resolves,
/// even if the caller stops waiting.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    state: Arc<watch::Sender<ConnectionState>>,
    transition: Arc<Mutex<()>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            connector,
            state: Arc::new(state),
            transition: Arc::new(Mutex::new(())),
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub async fn connect(&self, device: DeviceCandidate) -> Result<ConnectionState, ConnectError> {
        if let Some(settled) = self.settled(&device.id)? {
            return Ok(settled);
        }

        let permit = self.transition.clone().lock_owned().await;

        // The state may have moved while we waited for the permit.
        if let Some(settled) = self.settled(&device.id)? {
            return Ok(settled);
        }

        self.state.send_replace(ConnectionState::Connecting {
            device_id: device.id.clone(),
        });
        log_info!("Connecting to {} ({})", device.label(), device.id);

        let connector = self.connector.clone();
        let state = self.state.clone();
        let device_id = device.id.clone();
        let handshake = tokio::spawn(async move {
            let _permit = permit;
            match connector.connect(&device).await {
                Ok(()) => {
                    let connected = ConnectionState::Connected { device };
                    state.send_replace(connected.clone());
                    Ok(connected)
                }
                Err(reason) => {
                    state.send_replace(ConnectionState::Failed {
                        device_id: device.id.clone(),
                        reason: reason.clone(),
                    });
                    Err(ConnectError::ConnectFailed(reason))
                }
            }
        });

        let outcome = match handshake.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                let reason = format!("connection task aborted: {join_err}");
                self.state.send_replace(ConnectionState::Failed {
                    device_id: device_id.clone(),
                    reason: reason.clone(),
                });
                Err(ConnectError::ConnectFailed(reason))
            }
        };

        match &outcome {
            Ok(_) => log_info!("Connected to {device_id}"),
            Err(err) => log_warn!("Connection to {device_id} failed: {err}"),
        }
        outcome
    }

    /// Releases the active connection, waiting for any in-flight attempt to
    /// resolve first. Also clears an unacknowledged failure.
    pub async fn disconnect(&self) {
        let _permit = self.transition.lock().await;
        let current = self.current_state();

        match current {
            ConnectionState::Idle => {}
            ConnectionState::Connected { device } => {
                if let Err(reason) = self.connector.disconnect(&device).await {
                    log_error!("Disconnect from {} reported: {reason}", device.id);
                }
                log_info!("Disconnected from {}", device.id);
                self.state.send_replace(ConnectionState::Idle);
            }
            ConnectionState::Failed { .. } | ConnectionState::Connecting { .. } => {
                self.state.send_replace(ConnectionState::Idle);
            }
        }
    }

    /// `Failed -> Idle`. Any other state is left alone.
    pub fn acknowledge_failure(&self) -> ConnectionState {
        self.state.send_if_modified(|state| {
            if matches!(state, ConnectionState::Failed { .. }) {
                *state = ConnectionState::Idle;
                true
            } else {
                false
            }
        });
        self.current_state()
    }

    /// Checks the slot for `device_id` without waiting.
    ///
    /// `Ok(Some(state))` when the request is already satisfied, `Ok(None)`
    /// when a handshake is needed, and the rejection when another device
    /// holds the slot or a failure is unacknowledged.
    pub fn settled(&self, device_id: &str) -> Result<Option<ConnectionState>, ConnectError> {
        let state = self.current_state();
        match &state {
            ConnectionState::Idle => Ok(None),
            ConnectionState::Connected { device } if device.id == device_id => Ok(Some(state.clone())),
            // Same device already in flight: wait for the permit and re-check.
            ConnectionState::Connecting { device_id: active } if active == device_id => Ok(None),
            ConnectionState::Connecting { device_id: active } => Err(ConnectError::ConnectionBusy {
                active: active.clone(),
            }),
            ConnectionState::Connected { device } => Err(ConnectError::ConnectionBusy {
                active: device.id.clone(),
            }),
            ConnectionState::Failed { device_id, .. } => {
                Err(ConnectError::UnacknowledgedFailure(device_id.clone()))
            }
        }
    }
}
