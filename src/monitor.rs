//! Derives alerts from consecutive readings.
//!
//! The wearable integration records readings through [`ReadingRecorder`];
//! each new reading is compared with the previously stored one and a
//! drastic change is persisted as an alert.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::{Database, NewAlert, NewReading, Reading};
use crate::error::StoreError;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const STEP_JUMP_THRESHOLD: u64 = 500;
pub const CONFIDENCE_SWING_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeThresholds {
    pub step_jump: u64,
    pub confidence_swing: f64,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            step_jump: STEP_JUMP_THRESHOLD,
            confidence_swing: CONFIDENCE_SWING_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector {
    thresholds: ChangeThresholds,
}

impl ChangeDetector {
    pub fn new(thresholds: ChangeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn detect(&self, previous: &Reading, current: &NewReading) -> Vec<NewAlert> {
        let mut alerts = Vec::new();

        let step_diff = current.step_count.abs_diff(previous.step_count);
        if step_diff >= self.thresholds.step_jump {
            alerts.push(NewAlert::new(
                "steps",
                format!("Sudden step count change: {step_diff} steps"),
            ));
        }

        let swing = (current.confidence - previous.confidence).abs();
        if current.emotion_label != previous.emotion_label
            && swing >= self.thresholds.confidence_swing
        {
            alerts.push(NewAlert::new(
                "emotion",
                format!(
                    "Emotion shifted from {} to {} ({:.0}% confidence)",
                    previous.emotion_label,
                    current.emotion_label,
                    current.confidence * 100.0
                ),
            ));
        }

        alerts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recorded {
    pub reading_id: i64,
    pub alert_ids: Vec<i64>,
}

/// Entry point for the device integration layer.
///
/// Clones share one gate, so concurrent `record` calls run one at a time and
/// each reading is compared with the one stored right before it.
#[derive(Clone)]
pub struct ReadingRecorder {
    db: Database,
    detector: ChangeDetector,
    gate: Arc<Mutex<()>>,
}

impl ReadingRecorder {
    pub fn new(db: Database, detector: ChangeDetector) -> Self {
        Self {
            db,
            detector,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Stores `reading` and any alerts it triggers. The reading is written
    /// first; a failed alert write is logged and does not undo it.
    pub async fn record(&self, reading: NewReading) -> Result<Recorded, StoreError> {
        reading.validate()?;
        let _gate = self.gate.lock().await;
        let previous = self.db.latest_reading().await?;
        let alerts = previous
            .as_ref()
            .map(|previous| self.detector.detect(previous, &reading))
            .unwrap_or_default();

        let reading_id = self.db.add_reading(reading).await?;

        let mut alert_ids = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let kind = alert.kind.clone();
            match self.db.add_alert(alert).await {
                Ok(id) => {
                    log_info!("Raised {kind} alert {id} for reading {reading_id}");
                    alert_ids.push(id);
                }
                Err(err) => log_warn!("Failed to store {kind} alert for reading {reading_id}: {err}"),
            }
        }

        Ok(Recorded {
            reading_id,
            alert_ids,
        })
    }
}
