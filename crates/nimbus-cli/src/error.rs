use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] nimbus_core::Error),
    #[error(transparent)]
    Config(#[from] nimbus_core::ConfigError),
    #[error(transparent)]
    Remote(#[from] nimbus_core::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Report ID cannot be empty")]
    EmptyMutationId,
    #[error("Report not found for id/prefix: {0}")]
    MutationNotFound(String),
    #[error("{0}")]
    AmbiguousMutationId(String),
    #[error("Could not resolve a data directory; pass --db-path")]
    DataDirUnavailable,
    #[error("Remote store is not configured. Set NIMBUS_REMOTE_URL to enable `nimbus {0}`.")]
    RemoteNotConfigured(&'static str),
    #[error("Weather refresh failed: {0}")]
    Refresh(String),
    #[error("Cleanup failed: {0}")]
    Cleanup(String),
}
