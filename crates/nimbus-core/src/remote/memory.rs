//! In-process remote store.
//!
//! Behaves like the authoritative backend: reports are keyed by their
//! idempotency key, so a repeated push never creates a second record.
//! Rejections and outages can be injected to exercise retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Ack, PullOutcome, RemoteError, RemoteResult, RemoteStore};
use crate::models::{MutationId, ReportPayload, WeatherSnapshot};

#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    reports: Mutex<HashMap<MutationId, ReportPayload>>,
    rejections: Mutex<HashMap<MutationId, String>>,
    snapshots: Mutex<HashMap<String, WeatherSnapshot>>,
    unavailable: AtomicBool,
    push_calls: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every push of `id` with `message` until cleared.
    pub fn reject(&self, id: MutationId, message: impl Into<String>) {
        lock(&self.rejections).insert(id, message.into());
    }

    pub fn clear_rejections(&self) {
        lock(&self.rejections).clear();
    }

    /// Simulate an outage: every push and pull fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn insert_snapshot(&self, snapshot: WeatherSnapshot) {
        lock(&self.snapshots).insert(snapshot.location_key.clone(), snapshot);
    }

    /// Number of distinct reports held remotely.
    pub fn report_count(&self) -> usize {
        lock(&self.reports).len()
    }

    pub fn contains_report(&self, id: &MutationId) -> bool {
        lock(&self.reports).contains_key(id)
    }

    /// Total push calls received, including rejected and duplicate ones.
    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> RemoteResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("connection timed out".to_string()))
        } else {
            Ok(())
        }
    }
}

// A poisoned map is still structurally valid for this store.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn push(
        &self,
        payload: &ReportPayload,
        idempotency_key: &MutationId,
    ) -> RemoteResult<Ack> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if let Some(message) = lock(&self.rejections).get(idempotency_key) {
            return Err(RemoteError::Rejected {
                status: 422,
                message: message.clone(),
            });
        }

        let mut reports = lock(&self.reports);
        let duplicate = reports.contains_key(idempotency_key);
        // Last write wins for the same key
        reports.insert(*idempotency_key, payload.clone());
        Ok(Ack {
            remote_id: Some(idempotency_key.as_str()),
            duplicate,
        })
    }

    async fn pull(&self, key: &str) -> RemoteResult<PullOutcome> {
        self.check_available()?;
        Ok(lock(&self.snapshots)
            .get(key)
            .cloned()
            .map_or(PullOutcome::NotFound, PullOutcome::Found))
    }
}
