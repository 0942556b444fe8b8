use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Alert, NewAlert, NewReading, Reading};

/// The two persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Readings,
    Alerts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Readings => "readings",
            Collection::Alerts => "alerts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fields", rename_all = "camelCase")]
pub enum NewRecord {
    Reading(NewReading),
    Alert(NewAlert),
}

impl NewRecord {
    pub fn collection(&self) -> Collection {
        match self {
            NewRecord::Reading(_) => Collection::Readings,
            NewRecord::Alert(_) => Collection::Alerts,
        }
    }
}

impl From<NewReading> for NewRecord {
    fn from(reading: NewReading) -> Self {
        NewRecord::Reading(reading)
    }
}

impl From<NewAlert> for NewRecord {
    fn from(alert: NewAlert) -> Self {
        NewRecord::Alert(alert)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "camelCase")]
pub enum Record {
    Reading(Reading),
    Alert(Alert),
}

impl Record {
    pub fn id(&self) -> i64 {
        match self {
            Record::Reading(reading) => reading.id,
            Record::Alert(alert) => alert.id,
        }
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        match self {
            Record::Reading(reading) => reading.timestamp,
            Record::Alert(alert) => alert.timestamp,
        }
    }
}
