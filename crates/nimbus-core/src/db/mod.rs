//! Database layer for Nimbus

mod cache_repository;
mod connection;
mod migrations;
mod mutation_repository;
mod settings_repository;

pub use cache_repository::{CacheRepository, SqliteCacheRepository};
pub use connection::Database;
pub use mutation_repository::{MutationRepository, SqliteMutationRepository, StateCounts};
pub use settings_repository::{SettingsRepository, SqliteSettingsRepository};
