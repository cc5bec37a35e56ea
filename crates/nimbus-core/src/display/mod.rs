//! Display update collaborators (home-screen widget, logs).

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::DisplaySummary;

/// Receives normalized weather summaries after a successful refresh.
pub trait DisplaySink: Send + Sync {
    fn update_display(&self, summary: &DisplaySummary) -> Result<()>;
}

/// Writes the latest summary as JSON for a widget to pick up.
#[derive(Debug, Clone)]
pub struct JsonFileDisplay {
    path: PathBuf,
}

impl JsonFileDisplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySink for JsonFileDisplay {
    fn update_display(&self, summary: &DisplaySummary) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so readers never observe a half-written file
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_vec_pretty(summary)?)?;
        std::fs::rename(&staging, &self.path)?;
        tracing::debug!("Widget summary written to {}", self.path.display());
        Ok(())
    }
}

/// Emits summaries through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn update_display(&self, summary: &DisplaySummary) -> Result<()> {
        tracing::info!(
            location = %summary.location_label,
            temperature = summary.temperature,
            unit = summary.unit.symbol(),
            humidity = summary.humidity_pct,
            "{} {} ({})",
            summary.condition_glyph,
            summary.condition_text,
            summary.freshness
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TemperatureUnit;
    use tempfile::tempdir;

    fn summary() -> DisplaySummary {
        DisplaySummary {
            location_label: "Lisbon, PT".to_string(),
            temperature: 18,
            unit: TemperatureUnit::Celsius,
            condition_text: "Rain".to_string(),
            condition_glyph: "🌧️".to_string(),
            humidity_pct: 80,
            freshness: "Updated just now".to_string(),
        }
    }

    #[test]
    fn json_file_display_writes_summary() {
        let tmp = tempdir().unwrap();
        let display = JsonFileDisplay::new(tmp.path().join("widget").join("weather.json"));

        display.update_display(&summary()).unwrap();

        let written = std::fs::read_to_string(display.path()).unwrap();
        let decoded: DisplaySummary = serde_json::from_str(&written).unwrap();
        assert_eq!(decoded, summary());
        assert!(!display.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn log_display_accepts_summary() {
        assert!(LogDisplay.update_display(&summary()).is_ok());
    }
}
