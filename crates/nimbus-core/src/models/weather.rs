//! Weather snapshot and display summary models

use serde::{Deserialize, Serialize};

use super::settings::TemperatureUnit;
use crate::util::format_relative_time;

/// Current conditions pulled from the remote store for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_key: String,
    pub location_label: String,
    pub temperature_c: f64,
    /// Condition code ("clear", "rain", "thunderstorm", ...)
    pub condition: String,
    /// Optional provider description overriding the derived text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub humidity_pct: u8,
    /// Observation timestamp (Unix ms)
    pub observed_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hourly: Vec<HourlyForecast>,
}

/// One entry of an hourly forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// Forecast hour (Unix ms)
    pub at: i64,
    pub temperature_c: f64,
    pub condition: String,
}

/// Normalized summary forwarded to the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySummary {
    pub location_label: String,
    /// Rounded temperature in `unit`
    pub temperature: i32,
    pub unit: TemperatureUnit,
    pub condition_text: String,
    pub condition_glyph: String,
    pub humidity_pct: u8,
    /// Freshness label ("Updated 5m ago")
    pub freshness: String,
}

impl DisplaySummary {
    pub fn from_snapshot(snapshot: &WeatherSnapshot, unit: TemperatureUnit, now_ms: i64) -> Self {
        let condition_text = snapshot
            .description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map_or_else(|| condition_text(&snapshot.condition), ToString::to_string);

        Self {
            location_label: snapshot.location_label.clone(),
            temperature: unit.convert_rounded(snapshot.temperature_c),
            unit,
            condition_text,
            condition_glyph: condition_glyph(&snapshot.condition).to_string(),
            humidity_pct: snapshot.humidity_pct,
            freshness: freshness_label(snapshot.observed_at, now_ms),
        }
    }
}

/// Glyph shown next to the temperature for a condition code.
pub fn condition_glyph(condition: &str) -> &'static str {
    match condition.trim().to_ascii_lowercase().as_str() {
        "clear" | "sunny" => "☀️",
        "partly_cloudy" | "partly-cloudy" => "⛅",
        "clouds" | "cloudy" | "overcast" => "☁️",
        "drizzle" => "🌦️",
        "rain" | "showers" => "🌧️",
        "thunderstorm" | "storm" => "⛈️",
        "snow" | "sleet" => "❄️",
        "mist" | "fog" | "haze" => "🌫️",
        "wind" | "windy" => "💨",
        _ => "🌡️",
    }
}

/// Human readable text for a condition code ("partly_cloudy" -> "Partly cloudy").
pub fn condition_text(condition: &str) -> String {
    let words = condition.trim().replace(['_', '-'], " ").to_ascii_lowercase();
    let mut chars = words.chars();
    chars.next().map_or_else(
        || "Unknown".to_string(),
        |first| first.to_uppercase().chain(chars).collect(),
    )
}

fn freshness_label(observed_at: i64, now_ms: i64) -> String {
    let age = format_relative_time(observed_at, now_ms);
    if age == "just now" {
        "Updated just now".to_string()
    } else {
        format!("Updated {age}")
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot(key: &str, observed_at: i64) -> WeatherSnapshot {
    WeatherSnapshot {
        location_key: key.to_string(),
        location_label: "Lisbon, PT".to_string(),
        temperature_c: 18.4,
        condition: "partly_cloudy".to_string(),
        description: None,
        humidity_pct: 64,
        observed_at,
        hourly: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_normalizes_snapshot() {
        let now = 1_700_000_000_000;
        let snapshot = sample_snapshot("lisbon", now - 5 * 60_000);

        let summary = DisplaySummary::from_snapshot(&snapshot, TemperatureUnit::Celsius, now);
        assert_eq!(
            summary,
            DisplaySummary {
                location_label: "Lisbon, PT".to_string(),
                temperature: 18,
                unit: TemperatureUnit::Celsius,
                condition_text: "Partly cloudy".to_string(),
                condition_glyph: "⛅".to_string(),
                humidity_pct: 64,
                freshness: "Updated 5m ago".to_string(),
            }
        );
    }

    #[test]
    fn summary_prefers_provider_description_and_converts_units() {
        let now = 1_700_000_000_000;
        let mut snapshot = sample_snapshot("lisbon", now);
        snapshot.description = Some("Light breeze, scattered clouds".to_string());

        let summary = DisplaySummary::from_snapshot(&snapshot, TemperatureUnit::Fahrenheit, now);
        assert_eq!(summary.condition_text, "Light breeze, scattered clouds");
        assert_eq!(summary.temperature, 65);
        assert_eq!(summary.freshness, "Updated just now");
    }

    #[test]
    fn unknown_conditions_fall_back() {
        assert_eq!(condition_glyph("volcanic_ash"), "🌡️");
        assert_eq!(condition_text(""), "Unknown");
        assert_eq!(condition_text("THUNDERSTORM"), "Thunderstorm");
    }
}
