use nimbus_core::models::{Settings, TemperatureUnit};
use nimbus_core::util::normalize_text_option;

use crate::cli::UnitArg;
use crate::commands::common::{open_store, Context};
use crate::error::CliError;

/// Apply the requested changes; returns true when anything changed.
pub fn apply_home_changes(
    settings: &mut Settings,
    key: Option<String>,
    unit: Option<UnitArg>,
    clear: bool,
) -> bool {
    let mut changed = false;
    if clear {
        changed |= settings.home_location_key.take().is_some();
    } else if let Some(key) = normalize_text_option(key) {
        changed |= settings.home_location_key.as_deref() != Some(key.as_str());
        settings.home_location_key = Some(key);
    }
    if let Some(unit) = unit {
        let unit: TemperatureUnit = unit.into();
        changed |= settings.temperature_unit != unit;
        settings.temperature_unit = unit;
    }
    changed
}

pub async fn run_home(
    key: Option<String>,
    unit: Option<UnitArg>,
    clear: bool,
    ctx: &Context,
) -> Result<(), CliError> {
    let store = open_store(ctx)?;
    let mut settings = store.load_settings().await?;

    if apply_home_changes(&mut settings, key, unit, clear) {
        store.save_settings(&settings).await?;
    }

    println!(
        "Home: {}  Unit: {}",
        settings.home_location_key.as_deref().unwrap_or("(not set)"),
        settings.temperature_unit.symbol()
    );
    Ok(())
}
