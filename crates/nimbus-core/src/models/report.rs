//! Weather report and pending mutation models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum note length accepted on a report, in characters.
pub const MAX_NOTE_CHARS: usize = 500;

/// Accepted intensity range for a report.
pub const INTENSITY_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// A unique identifier for a queued mutation, using UUID v7 (time-sortable).
///
/// The same id is sent as the idempotency key on every push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationId(Uuid);

impl MutationId {
    /// Create a new unique mutation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MutationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A user-submitted weather report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub user_id: String,
    pub location_id: String,
    /// Human readable location label ("Lisbon, PT")
    pub location_label: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Condition code as reported by the user ("rain", "clear", ...)
    pub condition: String,
    /// Intensity on a 1-5 scale
    pub intensity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed_kmh: Option<f64>,
    #[serde(default)]
    pub note: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl ReportPayload {
    /// Validate and normalize the payload in place.
    ///
    /// Text fields are trimmed; the condition code is lowercased.
    pub fn validate(&mut self) -> Result<()> {
        self.user_id = required(&self.user_id, "user_id")?;
        self.location_id = required(&self.location_id, "location_id")?;
        self.location_label = required(&self.location_label, "location_label")?;
        self.condition = required(&self.condition, "condition")?.to_ascii_lowercase();
        self.note = self.note.trim().to_string();

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        if !INTENSITY_RANGE.contains(&self.intensity) {
            return Err(Error::InvalidInput(format!(
                "intensity {} is outside [{}, {}]",
                self.intensity,
                INTENSITY_RANGE.start(),
                INTENSITY_RANGE.end()
            )));
        }
        if let Some(humidity) = self.humidity_pct {
            if humidity > 100 {
                return Err(Error::InvalidInput(format!(
                    "humidity {humidity}% is above 100%"
                )));
            }
        }
        if self.wind_speed_kmh.is_some_and(|wind| wind < 0.0 || !wind.is_finite()) {
            return Err(Error::InvalidInput(
                "wind speed must be a non-negative number".into(),
            ));
        }
        if self.temperature_c.is_some_and(|temp| !temp.is_finite()) {
            return Err(Error::InvalidInput("temperature must be finite".into()));
        }
        if self.note.chars().count() > MAX_NOTE_CHARS {
            return Err(Error::InvalidInput(format!(
                "note exceeds {MAX_NOTE_CHARS} characters"
            )));
        }
        if self.created_at <= 0 {
            return Err(Error::InvalidInput("created_at must be set".into()));
        }
        Ok(())
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::InvalidInput(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Synchronization state of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Waiting for a push (including rows that failed and will be retried)
    Pending,
    /// Confirmed by the remote store
    Synced,
    /// Gave up after reaching the attempt ceiling
    Failed,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown sync state: {other}"))),
        }
    }
}

/// A locally queued write not yet confirmed by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: MutationId,
    pub payload: ReportPayload,
    pub state: SyncState,
    /// Message of the most recent failed push
    pub last_error: Option<String>,
    /// Number of failed push attempts
    pub attempts: u32,
    /// Confirmation timestamp (Unix ms), set once synced
    pub synced_at: Option<i64>,
}

impl PendingMutation {
    /// Creation timestamp of the underlying report
    pub const fn created_at(&self) -> i64 {
        self.payload.created_at
    }
}

#[cfg(test)]
pub(crate) fn sample_payload(label: &str, created_at: i64) -> ReportPayload {
    ReportPayload {
        user_id: "user-1".to_string(),
        location_id: format!("loc-{}", label.to_ascii_lowercase()),
        location_label: label.to_string(),
        latitude: 38.72,
        longitude: -9.14,
        condition: "rain".to_string(),
        intensity: 3,
        temperature_c: Some(14.5),
        humidity_pct: Some(82),
        wind_speed_kmh: None,
        note: String::new(),
        created_at,
    }
}
