use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use nimbus_core::models::TemperatureUnit;

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "Offline-first weather reports from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a weather report (queued when the remote is unreachable)
    Report(ReportArgs),
    /// List queued reports
    Queue {
        /// Include synced and failed reports
        #[arg(long)]
        all: bool,
        /// Number of reports to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop a report that has not been synced
    Discard {
        /// Report ID or unique ID prefix
        id: String,
    },
    /// Move abandoned reports back into the queue
    RetryFailed,
    /// Run one sync pass now
    Sync,
    /// Refresh the home location weather now
    Refresh,
    /// Evict expired cache rows and old synced reports
    Cleanup,
    /// Show or change the home location and display unit
    Home {
        /// Remote lookup key of the home location
        key: Option<String>,
        /// Display temperature unit
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,
        /// Forget the configured home location
        #[arg(long, conflicts_with = "key")]
        clear: bool,
    },
    /// Show queue and cache status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the background scheduler until interrupted
    Daemon {
        /// Seconds between connectivity probes
        #[arg(long, default_value = "30", value_name = "SECS")]
        probe_interval: u64,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Stable location identifier
    #[arg(long, value_name = "ID")]
    pub location_id: String,
    /// Human readable location label
    #[arg(long, value_name = "LABEL")]
    pub label: String,
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,
    /// Condition code (clear, rain, snow, ...)
    #[arg(long)]
    pub condition: String,
    /// Intensity from 1 (light) to 5 (severe)
    #[arg(long, default_value = "3")]
    pub intensity: u8,
    /// Temperature in degrees Celsius
    #[arg(long, allow_negative_numbers = true, value_name = "CELSIUS")]
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    #[arg(long, value_name = "PCT")]
    pub humidity: Option<u8>,
    /// Wind speed in km/h
    #[arg(long, value_name = "KMH")]
    pub wind: Option<f64>,
    /// Free-form note
    #[arg(long, default_value = "")]
    pub note: String,
    /// Reporting user
    #[arg(long, env = "NIMBUS_USER_ID", default_value = "local")]
    pub user: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum UnitArg {
    Celsius,
    Fahrenheit,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Celsius => Self::Celsius,
            UnitArg::Fahrenheit => Self::Fahrenheit,
        }
    }
}
