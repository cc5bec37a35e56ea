//! Remote store contract consumed by the sync and refresh workers.
//!
//! The remote store is the single authoritative sink. Pushes carry the
//! mutation id as an idempotency key, so delivering the same report twice
//! must not create a second remote record.

mod http;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{MutationId, ReportPayload, WeatherSnapshot};

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

/// Errors surfaced by a remote store client.
///
/// All variants are treated as transient by the workers.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote store configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("{}", rejection_message(*status, message))]
    Rejected { status: u16, message: String },
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The server's reason, or the status code when it sent none.
fn rejection_message(status: u16, message: &str) -> String {
    let message = message.trim();
    if message.is_empty() {
        format!("Rejected with HTTP {status}")
    } else {
        message.to_string()
    }
}

/// Acknowledgement of a pushed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Identifier assigned by the remote store, when it returns one
    pub remote_id: Option<String>,
    /// Whether the remote already held a record for this idempotency key
    pub duplicate: bool,
}

/// Outcome of a snapshot pull.
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    Found(WeatherSnapshot),
    NotFound,
}

/// Push/pull contract against the authoritative backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Deliver a report. Repeated calls with the same key are no-ops remotely.
    async fn push(
        &self,
        payload: &ReportPayload,
        idempotency_key: &MutationId,
    ) -> RemoteResult<Ack>;

    /// Fetch the latest snapshot for a lookup key.
    async fn pull(&self, key: &str) -> RemoteResult<PullOutcome>;
}
