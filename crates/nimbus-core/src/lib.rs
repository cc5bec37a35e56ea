//! nimbus-core - Core library for Nimbus
//!
//! Offline-first weather reporting: a durable local queue of user reports,
//! a snapshot cache for offline reads, and the background jobs that push
//! reports, refresh the home location and sweep expired data.

pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod jobs;
pub mod models;
pub mod remote;
pub mod services;
pub mod util;

pub use config::{ConfigError, SyncConfig};
pub use error::{Error, Result};
pub use jobs::{BackoffPolicy, Job, JobSpec, Scheduler, WorkResult};
pub use models::{MutationId, PendingMutation, ReportPayload, SyncState};
pub use remote::{RemoteError, RemoteStore};
pub use services::{LocalStore, ReportService, SubmitOutcome};
