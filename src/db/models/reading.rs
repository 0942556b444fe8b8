//! Reading data model.
//!
//! One timestamped emotion/activity observation reported by the wearable.
//! Readings are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub emotion_label: String,
    pub confidence: f64,
    pub step_count: u64,
}

/// Fields supplied by the device integration; id and timestamp are assigned
/// by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReading {
    pub emotion_label: String,
    pub confidence: f64,
    pub step_count: u64,
}

impl NewReading {
    pub fn new(emotion_label: impl Into<String>, confidence: f64, step_count: u64) -> Self {
        Self {
            emotion_label: emotion_label.into(),
            confidence,
            step_count,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.emotion_label.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "emotion label must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(StoreError::InvalidRecord(format!(
                "confidence {} is outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}
