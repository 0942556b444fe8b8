//! Discovered devices and their signal-quality ranking.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A device seen during one scan. Candidates live only as long as the scan
/// result set they belong to and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCandidate {
    pub id: String,
    pub display_name: Option<String>,
    /// Received signal strength in dBm.
    pub signal_strength: i16,
    pub discovered_at: DateTime<Utc>,
}

impl DeviceCandidate {
    pub fn quality(&self) -> SignalQuality {
        SignalQuality::from_rssi(self.signal_strength)
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Unnamed Device")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SignalQuality {
    pub fn from_rssi(rssi: i16) -> Self {
        match rssi {
            r if r >= -60 => SignalQuality::Excellent,
            r if r >= -70 => SignalQuality::Good,
            r if r >= -80 => SignalQuality::Fair,
            _ => SignalQuality::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalQuality::Excellent => "Excellent",
            SignalQuality::Good => "Good",
            SignalQuality::Fair => "Fair",
            SignalQuality::Poor => "Poor",
        }
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapses repeated sightings of the same device to its strongest sample
/// and orders the result strongest first, then by id.
pub fn rank(sightings: Vec<DeviceCandidate>) -> Vec<DeviceCandidate> {
    let mut strongest: HashMap<String, DeviceCandidate> = HashMap::new();
    for sighting in sightings {
        match strongest.get_mut(&sighting.id) {
            Some(existing) => {
                if sighting.signal_strength > existing.signal_strength {
                    let display_name = sighting
                        .display_name
                        .clone()
                        .or_else(|| existing.display_name.take());
                    *existing = DeviceCandidate {
                        display_name,
                        ..sighting
                    };
                } else if existing.display_name.is_none() {
                    existing.display_name = sighting.display_name;
                }
            }
            None => {
                strongest.insert(sighting.id.clone(), sighting);
            }
        }
    }

    let mut ranked: Vec<DeviceCandidate> = strongest.into_values().collect();
    ranked.sort_by(|a, b| {
        b.signal_strength
            .cmp(&a.signal_strength)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
}
