//! Job admission and dispatch.
//!
//! [`JobTable`] holds the registration state and takes the current time
//! explicitly, so every policy decision is testable without a clock.
//! [`Scheduler`] drives a table on the tokio runtime: it owns the job
//! implementations, spawns one task per dispatched instance and sleeps until
//! the next wake-up, a connectivity change, a completion or a new request.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{BackoffPolicy, ConflictPolicy, Job, JobKind, JobSpec, WorkResult};
use crate::util::{duration_millis, now_millis};

const DEFAULT_FOLLOWUP_DELAY: Duration = Duration::from_secs(60);

/// State of one registered job name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub spec: JobSpec,
    /// Earliest dispatch time (Unix ms)
    pub next_eligible_at: i64,
    /// Consecutive retries since the last successful pass
    pub attempt: u32,
    pub running: bool,
    /// Replacement requested while an instance was running
    pub deferred: Option<JobSpec>,
    pub last_started_at: Option<i64>,
    generation: u64,
}

/// Result of a schedule request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Registered,
    /// A not-yet-started instance was superseded
    Replaced,
    /// Recorded behind the running instance
    Deferred,
    /// Keep policy: the existing registration is untouched
    Kept,
}

/// A job instance handed out for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub name: String,
    pub attempt: u32,
    generation: u64,
}

/// What the table did with a finished instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// One-time job done, registration removed
    Finished,
    Rescheduled { at: i64 },
    /// The registration was cancelled or replaced; the result is ignored
    Discarded,
}

#[derive(Debug, Clone)]
pub struct JobTable {
    jobs: BTreeMap<String, Registration>,
    connected: bool,
    backoff: BackoffPolicy,
    followup_delay: Duration,
    generation: u64,
    /// Instances still running after `cancel_all`, by name and generation
    cancelled_in_flight: BTreeMap<String, u64>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(BackoffPolicy::default(), DEFAULT_FOLLOWUP_DELAY)
    }
}

impl JobTable {
    /// Connectivity starts unknown and is treated as absent until reported.
    pub const fn new(backoff: BackoffPolicy, followup_delay: Duration) -> Self {
        Self {
            jobs: BTreeMap::new(),
            connected: false,
            backoff,
            followup_delay,
            generation: 0,
            cancelled_in_flight: BTreeMap::new(),
        }
    }

    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn registration(&self, name: &str) -> Option<&Registration> {
        self.jobs.get(name)
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn schedule(&mut self, spec: JobSpec, now: i64) -> ScheduleOutcome {
        let generation = self.next_generation();
        let Some(existing) = self.jobs.get_mut(&spec.name) else {
            let name = spec.name.clone();
            let in_flight = self.cancelled_in_flight.contains_key(&name);
            self.jobs.insert(name, fresh_registration(spec, now, generation));
            return if in_flight {
                ScheduleOutcome::Deferred
            } else {
                ScheduleOutcome::Registered
            };
        };

        let policy = spec.policy;
        match policy {
            ConflictPolicy::Keep => ScheduleOutcome::Kept,
            ConflictPolicy::Replace if existing.running => {
                existing.deferred = Some(spec);
                ScheduleOutcome::Deferred
            }
            ConflictPolicy::Replace => {
                *existing = fresh_registration(spec, now, generation);
                ScheduleOutcome::Replaced
            }
        }
    }

    /// Returns true when the value changed.
    pub fn set_connectivity(&mut self, connected: bool) -> bool {
        let changed = self.connected != connected;
        self.connected = connected;
        changed
    }

    /// Mark every eligible, idle job as running and hand it out.
    pub fn take_due(&mut self, now: i64) -> Vec<Dispatch> {
        let connected = self.connected;
        let cancelled = &self.cancelled_in_flight;
        self.jobs
            .values_mut()
            .filter(|reg| is_dispatchable(reg, connected, cancelled) && reg.next_eligible_at <= now)
            .map(|reg| {
                reg.running = true;
                reg.last_started_at = Some(now);
                Dispatch {
                    name: reg.spec.name.clone(),
                    attempt: reg.attempt,
                    generation: reg.generation,
                }
            })
            .collect()
    }

    /// Apply the result of a finished instance.
    pub fn complete(&mut self, dispatch: &Dispatch, result: &WorkResult, now: i64) -> CompletionOutcome {
        if self.cancelled_in_flight.get(&dispatch.name) == Some(&dispatch.generation) {
            self.cancelled_in_flight.remove(&dispatch.name);
            return CompletionOutcome::Discarded;
        }

        let generation = self.next_generation();
        let Some(reg) = self.jobs.get_mut(&dispatch.name) else {
            return CompletionOutcome::Discarded;
        };
        if reg.generation != dispatch.generation {
            return CompletionOutcome::Discarded;
        }
        reg.running = false;

        if let Some(spec) = reg.deferred.take() {
            *reg = fresh_registration(spec, now, generation);
            return CompletionOutcome::Rescheduled {
                at: reg.next_eligible_at,
            };
        }

        let next = match (reg.spec.kind, result) {
            (JobKind::OneTime { .. }, WorkResult::Success(summary)) if summary.reschedule => {
                reg.attempt = 0;
                Some(after(now, self.followup_delay))
            }
            (JobKind::OneTime { .. }, WorkResult::Success(_) | WorkResult::Failure(_)) => None,
            (_, WorkResult::Retry(_)) => {
                let delay = self.backoff.next_delay(reg.attempt);
                reg.attempt = reg.attempt.saturating_add(1);
                Some(after(now, delay))
            }
            (JobKind::Periodic { interval, flex }, WorkResult::Success(_) | WorkResult::Failure(_)) => {
                reg.attempt = 0;
                let started = reg.last_started_at.unwrap_or(now);
                Some(after(started, interval.saturating_sub(flex)))
            }
        };

        match next {
            Some(at) => {
                reg.next_eligible_at = at;
                CompletionOutcome::Rescheduled { at }
            }
            None => {
                self.jobs.remove(&dispatch.name);
                CompletionOutcome::Finished
            }
        }
    }

    /// Drop every registration; running instances complete as discarded.
    ///
    /// A cancelled name stays blocked until its running instance reports back,
    /// so a re-registration never runs alongside it.
    pub fn cancel_all(&mut self) {
        for (name, reg) in std::mem::take(&mut self.jobs) {
            if reg.running {
                self.cancelled_in_flight.insert(name, reg.generation);
            }
        }
    }

    /// Earliest time an idle job becomes eligible, ignoring jobs blocked on connectivity.
    pub fn next_wake(&self) -> Option<i64> {
        self.jobs
            .values()
            .filter(|reg| is_dispatchable(reg, self.connected, &self.cancelled_in_flight))
            .map(|reg| reg.next_eligible_at)
            .min()
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

fn fresh_registration(spec: JobSpec, now: i64, generation: u64) -> Registration {
    let next_eligible_at = match spec.kind {
        JobKind::OneTime { initial_delay } => after(now, initial_delay),
        JobKind::Periodic { .. } => now,
    };
    Registration {
        spec,
        next_eligible_at,
        attempt: 0,
        running: false,
        deferred: None,
        last_started_at: None,
        generation,
    }
}

fn is_dispatchable(reg: &Registration, connected: bool, cancelled: &BTreeMap<String, u64>) -> bool {
    !reg.running
        && !cancelled.contains_key(&reg.spec.name)
        && (connected || !reg.spec.constraints.requires_connectivity)
}

fn after(at: i64, delay: Duration) -> i64 {
    at.saturating_add(duration_millis(delay))
}

struct Shared {
    table: Mutex<JobTable>,
    jobs: Mutex<HashMap<String, Arc<dyn Job>>>,
    wake: Notify,
}

/// Async driver over a [`JobTable`].
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(JobTable::default())
    }
}

impl Scheduler {
    pub fn new(table: JobTable) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(table),
                jobs: Mutex::new(HashMap::new()),
                wake: Notify::new(),
            }),
        }
    }

    /// Bind a job implementation to a registry name.
    pub async fn register_job(&self, name: impl Into<String>, job: Arc<dyn Job>) {
        self.shared.jobs.lock().await.insert(name.into(), job);
    }

    pub async fn schedule(&self, spec: JobSpec) -> ScheduleOutcome {
        let name = spec.name.clone();
        let outcome = self.shared.table.lock().await.schedule(spec, now_millis());
        tracing::debug!(job = %name, ?outcome, "Schedule request");
        self.shared.wake.notify_one();
        outcome
    }

    pub async fn set_connectivity(&self, connected: bool) {
        if self.shared.table.lock().await.set_connectivity(connected) {
            tracing::info!(connected, "Connectivity changed");
            self.shared.wake.notify_one();
        }
    }

    pub async fn cancel_all(&self) {
        self.shared.table.lock().await.cancel_all();
        tracing::info!("All scheduled jobs cancelled");
        self.shared.wake.notify_one();
    }

    pub async fn registration(&self, name: &str) -> Option<Registration> {
        self.shared.table.lock().await.registration(name).cloned()
    }

    pub async fn registrations(&self) -> Vec<Registration> {
        self.shared
            .table
            .lock()
            .await
            .registrations()
            .cloned()
            .collect()
    }

    /// Spawn every job that is due now.
    pub async fn dispatch_due(&self) -> Vec<JoinHandle<WorkResult>> {
        let now = now_millis();
        let due = self.shared.table.lock().await.take_due(now);
        let mut handles = Vec::with_capacity(due.len());

        for dispatch in due {
            let job = self.shared.jobs.lock().await.get(&dispatch.name).cloned();
            let shared = Arc::clone(&self.shared);
            handles.push(tokio::spawn(async move {
                let result = match job {
                    Some(job) => {
                        tracing::info!(job = %dispatch.name, attempt = dispatch.attempt, "Job started");
                        job.run().await
                    }
                    None => WorkResult::Failure(format!("no job bound to {}", dispatch.name)),
                };
                let outcome = shared
                    .table
                    .lock()
                    .await
                    .complete(&dispatch, &result, now_millis());
                log_completion(&dispatch, &result, outcome);
                shared.wake.notify_one();
                result
            }));
        }

        handles
    }

    /// Drive the table until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("Scheduler started");
        loop {
            self.dispatch_due().await;

            let wake_in = self
                .shared
                .table
                .lock()
                .await
                .next_wake()
                .map(|at| Duration::from_millis(u64::try_from(at - now_millis()).unwrap_or(0)));

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = self.shared.wake.notified() => {}
                () = sleep_or_pending(wake_in) => {}
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

async fn sleep_or_pending(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending::<()>().await,
    }
}

fn log_completion(dispatch: &Dispatch, result: &WorkResult, outcome: CompletionOutcome) {
    match result {
        WorkResult::Success(_) => {
            tracing::info!(job = %dispatch.name, ?outcome, "Job finished: {result}");
        }
        WorkResult::Retry(_) => {
            tracing::warn!(job = %dispatch.name, ?outcome, "Job finished: {result}");
        }
        WorkResult::Failure(_) => {
            tracing::error!(job = %dispatch.name, ?outcome, "Job finished: {result}");
        }
    }
}
