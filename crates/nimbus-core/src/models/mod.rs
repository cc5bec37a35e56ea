//! Data models for Nimbus

mod cache;
mod report;
mod settings;
mod weather;

pub use cache::{CacheClass, CachedEntity};
pub use report::{
    MutationId, PendingMutation, ReportPayload, SyncState, INTENSITY_RANGE, MAX_NOTE_CHARS,
};
pub use settings::{Settings, TemperatureUnit};
pub use weather::{condition_glyph, condition_text, DisplaySummary, HourlyForecast, WeatherSnapshot};

#[cfg(test)]
pub(crate) use report::sample_payload;
#[cfg(test)]
pub(crate) use weather::sample_snapshot;
