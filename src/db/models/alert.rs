//! Alert data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A notable event derived from readings. `acknowledged` is the only field
/// that changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    pub kind: String,
    pub message: String,
}

impl NewAlert {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.kind.trim().is_empty() {
            return Err(StoreError::InvalidRecord("alert kind must not be empty".into()));
        }
        Ok(())
    }
}
