//! Local settings model

use serde::{Deserialize, Serialize};

/// Temperature unit used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Degrees Celsius
    #[default]
    Celsius,
    /// Degrees Fahrenheit
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a Celsius reading into this unit, rounded to the nearest degree.
    #[allow(clippy::cast_possible_truncation)] // display temperatures fit in i32
    pub fn convert_rounded(self, celsius: f64) -> i32 {
        let value = match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius.mul_add(9.0 / 5.0, 32.0),
        };
        value.round() as i32
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// Device-local settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Lookup key of the "home" location refreshed in the background
    pub home_location_key: Option<String>,
    /// Unit used for the display summary
    pub temperature_unit: TemperatureUnit,
}
