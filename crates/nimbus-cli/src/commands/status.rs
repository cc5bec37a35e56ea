use chrono::Utc;
use nimbus_core::db::StateCounts;
use nimbus_core::models::{CacheClass, DisplaySummary, WeatherSnapshot};
use serde::Serialize;

use crate::commands::common::{format_timestamp, open_store, Context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub remote_url: Option<String>,
    pub queue: StateCounts,
    pub home_location_key: Option<String>,
    pub cached_weather: Option<DisplaySummary>,
    pub weather_fetched_at: Option<i64>,
    pub cache_entries: usize,
}

pub async fn collect_status(ctx: &Context) -> Result<StatusReport, CliError> {
    let store = open_store(ctx)?;
    let settings = store.load_settings().await?;
    let now_ms = Utc::now().timestamp_millis();

    let cached_entry = match settings.home_location_key.as_deref() {
        Some(key) => store.get_cache(key, CacheClass::Weather).await?,
        None => None,
    };
    let weather_fetched_at = cached_entry.as_ref().map(|entry| entry.fetched_at);
    let cached_weather = cached_entry
        .map(|entry| entry.decode::<WeatherSnapshot>())
        .transpose()?
        .map(|snapshot| DisplaySummary::from_snapshot(&snapshot, settings.temperature_unit, now_ms));

    let mut cache_entries = 0;
    for class in CacheClass::ALL {
        cache_entries += store.list_cache(class).await?.len();
    }

    Ok(StatusReport {
        db_path: ctx.db_path.display().to_string(),
        remote_url: ctx.config.remote_url.clone(),
        queue: store.count_by_state().await?,
        home_location_key: settings.home_location_key,
        cached_weather,
        weather_fetched_at,
        cache_entries,
    })
}

pub fn format_status_lines(status: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("Database:  {}", status.db_path),
        format!(
            "Remote:    {}",
            status.remote_url.as_deref().unwrap_or("not configured")
        ),
        format!(
            "Queue:     {} pending, {} synced, {} failed",
            status.queue.pending, status.queue.synced, status.queue.failed
        ),
        format!(
            "Home:      {}",
            status.home_location_key.as_deref().unwrap_or("(not set)")
        ),
    ];
    if let Some(weather) = &status.cached_weather {
        lines.push(format!(
            "Weather:   {}{} {} {} ({})",
            weather.temperature,
            weather.unit.symbol(),
            weather.condition_glyph,
            weather.condition_text,
            weather.freshness
        ));
    }
    if let Some(fetched_at) = status.weather_fetched_at {
        lines.push(format!("Fetched:   {}", format_timestamp(fetched_at)));
    }
    lines.push(format!("Cache:     {} entries", status.cache_entries));
    lines
}

pub async fn run_status(as_json: bool, ctx: &Context) -> Result<(), CliError> {
    let status = collect_status(ctx).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_status_lines(&status) {
            println!("{line}");
        }
    }
    Ok(())
}
