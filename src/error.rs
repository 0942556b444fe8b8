//! Error taxonomy for the store, the scanner and the connection manager.
//!
//! Every variant renders as a message that can be shown to the user as-is;
//! the command layer forwards `to_string()` without rewording.

use std::fmt::Display;

use thiserror::Error;

use crate::db::Collection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local storage is unavailable: {0}")]
    StorageUnavailable(String),
    #[error("failed to write record: {0}")]
    WriteFailed(String),
    #[error("failed to read records: {0}")]
    ReadFailed(String),
    #[error("no {collection} record with id {id}")]
    NotFound { collection: Collection, id: i64 },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    pub(crate) fn unavailable(err: impl Display) -> Self {
        Self::StorageUnavailable(err.to_string())
    }

    pub(crate) fn write(err: impl Display) -> Self {
        Self::WriteFailed(err.to_string())
    }

    pub(crate) fn read(err: impl Display) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Bluetooth scanning is not supported on this host")]
    ScannerUnavailable,
    #[error("Bluetooth scan was cancelled. Please try again.")]
    UserCancelled,
    #[error("No Bluetooth adapter found. Please check if your device supports Bluetooth.")]
    NoAdapter,
    #[error("no device responded within {0} ms")]
    Timeout(u64),
    #[error("Bluetooth scan failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("already connected or connecting to {active}")]
    ConnectionBusy { active: String },
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("device {0} was not found in the latest scan")]
    UnknownDevice(String),
    #[error("previous connection to {0} failed; acknowledge the failure first")]
    UnacknowledgedFailure(String),
}
