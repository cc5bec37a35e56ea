//! Background jobs: scheduler, backoff policy, and the three workers.

mod backoff;
mod cleanup;
mod refresh;
mod scheduler;
mod sync_worker;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use backoff::BackoffPolicy;
pub use cleanup::{CleanupReport, CleanupSweeper, SYNCED_RETENTION};
pub use refresh::{RefreshOutcome, RefreshWorker};
pub use scheduler::{
    CompletionOutcome, Dispatch, JobTable, Registration, ScheduleOutcome, Scheduler,
};
pub use sync_worker::{SyncPassReport, SyncWorker};

pub const SYNC_REPORTS_JOB: &str = "sync_reports";
pub const WEATHER_REFRESH_JOB: &str = "weather_refresh";
pub const DAILY_CLEANUP_JOB: &str = "daily_cleanup";

/// Metadata attached to a successful pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkSummary {
    /// Rows pushed, refreshed or evicted by the pass
    pub affected: usize,
    /// Ask the scheduler for a follow-up one-time pass
    pub reschedule: bool,
}

/// Aggregate outcome of one job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkResult {
    Success(WorkSummary),
    /// Transient failure, re-armed with backoff
    Retry(String),
    /// Terminal failure, not retried
    Failure(String),
}

impl WorkResult {
    pub const fn success(affected: usize) -> Self {
        Self::Success(WorkSummary {
            affected,
            reschedule: false,
        })
    }
}

impl fmt::Display for WorkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(summary) if summary.reschedule => {
                write!(f, "success ({} affected, follow-up requested)", summary.affected)
            }
            Self::Success(summary) => write!(f, "success ({} affected)", summary.affected),
            Self::Retry(reason) => write!(f, "retry: {reason}"),
            Self::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// A unit of background work the scheduler can dispatch.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> WorkResult;
}

/// How often a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    OneTime { initial_delay: Duration },
    /// Runs once per `interval`, at the earliest `interval - flex` after the last start
    Periodic { interval: Duration, flex: Duration },
}

/// What happens when a job name is scheduled while already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Supersede the not-yet-started instance
    Replace,
    /// Ignore the new request
    Keep,
}

/// Conditions that must hold before a job is dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constraints {
    pub requires_connectivity: bool,
}

/// A named, schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: String,
    pub kind: JobKind,
    pub constraints: Constraints,
    pub policy: ConflictPolicy,
}

impl JobSpec {
    /// One sync pass over the report queue.
    pub fn sync_reports() -> Self {
        Self::sync_reports_after(Duration::ZERO)
    }

    pub fn sync_reports_after(initial_delay: Duration) -> Self {
        Self {
            name: SYNC_REPORTS_JOB.to_string(),
            kind: JobKind::OneTime { initial_delay },
            constraints: Constraints {
                requires_connectivity: true,
            },
            policy: ConflictPolicy::Replace,
        }
    }

    /// Home weather refresh every 30 minutes.
    pub fn weather_refresh() -> Self {
        Self {
            name: WEATHER_REFRESH_JOB.to_string(),
            kind: JobKind::Periodic {
                interval: Duration::from_secs(30 * 60),
                flex: Duration::from_secs(5 * 60),
            },
            constraints: Constraints {
                requires_connectivity: true,
            },
            policy: ConflictPolicy::Keep,
        }
    }

    /// Daily cache and queue housekeeping.
    pub fn daily_cleanup() -> Self {
        Self {
            name: DAILY_CLEANUP_JOB.to_string(),
            kind: JobKind::Periodic {
                interval: Duration::from_secs(24 * 60 * 60),
                flex: Duration::ZERO,
            },
            constraints: Constraints::default(),
            policy: ConflictPolicy::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_matches_external_contract() {
        let sync = JobSpec::sync_reports();
        assert_eq!(sync.name, "sync_reports");
        assert_eq!(sync.policy, ConflictPolicy::Replace);
        assert!(sync.constraints.requires_connectivity);
        assert!(matches!(sync.kind, JobKind::OneTime { .. }));

        let refresh = JobSpec::weather_refresh();
        assert_eq!(refresh.name, "weather_refresh");
        assert_eq!(refresh.policy, ConflictPolicy::Keep);
        assert!(refresh.constraints.requires_connectivity);
        assert_eq!(
            refresh.kind,
            JobKind::Periodic {
                interval: Duration::from_secs(1_800),
                flex: Duration::from_secs(300),
            }
        );

        let cleanup = JobSpec::daily_cleanup();
        assert_eq!(cleanup.name, "daily_cleanup");
        assert_eq!(cleanup.policy, ConflictPolicy::Keep);
        assert!(!cleanup.constraints.requires_connectivity);
    }

    #[test]
    fn work_result_display() {
        assert_eq!(WorkResult::success(2).to_string(), "success (2 affected)");
        assert_eq!(
            WorkResult::Retry("offline".into()).to_string(),
            "retry: offline"
        );
    }
}
