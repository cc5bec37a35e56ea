//! Cached remote snapshot model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Class of a cached entity; each class carries its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheClass {
    /// Current conditions snapshot
    Weather,
    /// Hourly forecast entries
    HourlyForecast,
    /// Notification records shown to the user
    Notification,
}

impl CacheClass {
    pub const ALL: [Self; 3] = [Self::Weather, Self::HourlyForecast, Self::Notification];

    /// Age beyond which an entry of this class is evicted.
    pub const fn ttl(self) -> Duration {
        match self {
            Self::Weather => Duration::from_secs(24 * HOUR.as_secs()),
            Self::HourlyForecast => Duration::from_secs(6 * HOUR.as_secs()),
            Self::Notification => Duration::from_secs(7 * 24 * HOUR.as_secs()),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::HourlyForecast => "hourly_forecast",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for CacheClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown cache class: {s}")))
    }
}

/// A remote snapshot stored for offline reads and widget display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntity {
    pub key: String,
    pub class: CacheClass,
    /// Serialized JSON payload
    pub payload: String,
    /// Fetch timestamp (Unix ms)
    pub fetched_at: i64,
}

impl CachedEntity {
    /// Serialize `value` into a new cache entry.
    pub fn from_value<T: Serialize>(
        key: impl Into<String>,
        class: CacheClass,
        value: &T,
        fetched_at: i64,
    ) -> Result<Self> {
        Ok(Self {
            key: key.into(),
            class,
            payload: serde_json::to_string(value)?,
            fetched_at,
        })
    }

    /// Deserialize the cached payload.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttls_match_retention_table() {
        assert_eq!(CacheClass::Weather.ttl(), Duration::from_secs(86_400));
        assert_eq!(CacheClass::HourlyForecast.ttl(), Duration::from_secs(21_600));
        assert_eq!(CacheClass::Notification.ttl(), Duration::from_secs(604_800));
    }

    #[test]
    fn class_parses_from_storage_name() {
        for class in CacheClass::ALL {
            assert_eq!(class.as_str().parse::<CacheClass>().unwrap(), class);
        }
        assert!("forecast".parse::<CacheClass>().is_err());
    }

    #[test]
    fn entity_round_trips_payload() {
        let entity =
            CachedEntity::from_value("home", CacheClass::Notification, &vec![1, 2, 3], 42).unwrap();
        let decoded: Vec<i32> = entity.decode().unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }
}
