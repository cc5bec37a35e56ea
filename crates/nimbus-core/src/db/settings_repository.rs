//! Settings repository implementation

use crate::error::Result;
use crate::models::{Settings, TemperatureUnit};
use rusqlite::{params, Connection};

const HOME_LOCATION_KEY: &str = "home_location_key";
const TEMPERATURE_UNIT: &str = "temperature_unit";

/// Trait for settings storage operations
pub trait SettingsRepository {
    /// Load settings from the database
    fn load(&self) -> Result<Settings>;

    /// Save settings to the database
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_setting(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                params![key, value],
            )?,
            None => self
                .conn
                .execute("DELETE FROM settings WHERE key = ?", params![key])?,
        };
        Ok(())
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load(&self) -> Result<Settings> {
        let mut settings = Settings {
            home_location_key: self.get_setting(HOME_LOCATION_KEY)?,
            ..Settings::default()
        };

        if let Some(value) = self.get_setting(TEMPERATURE_UNIT)? {
            settings.temperature_unit =
                serde_json::from_str::<TemperatureUnit>(&format!("\"{value}\"")).unwrap_or_default();
        }

        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        self.set_setting(HOME_LOCATION_KEY, settings.home_location_key.as_deref())?;
        let unit = serde_json::to_string(&settings.temperature_unit)?;
        self.set_setting(TEMPERATURE_UNIT, Some(unit.trim_matches('"')))?;
        Ok(())
    }
}
