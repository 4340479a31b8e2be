//! Reconciliation statistics collection.
//!
//! This module tracks what the agent has done since it started:
//! - Runs completed and aborted
//! - Restarts requested
//! - Remote tiers that fell back to the empty document
//! - Documents written
//! - Outcome of the most recent run
//!
//! Counters are plain atomics so the scheduler can record a run without
//! holding anything the HTTP handlers need.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use fleetconf_core::{PersistStatus, ReconcileReport, RunOutcome};
use serde::Serialize;
use uuid::Uuid;

use crate::TriggerSource;

/// Summary of the most recent run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    pub run_id: Uuid,
    pub trigger: TriggerSource,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub restart_requested: bool,
}

/// Point-in-time view of the statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub runs: u64,
    pub aborted_runs: u64,
    pub restarts_requested: u64,
    pub degraded_tiers: u64,
    pub remote_writes: u64,
    pub effective_writes: u64,
    pub last_run: Option<LastRun>,
    pub uptime: u64,
    pub dropped_log_entries: u64,
}

/// Collects and tracks reconciliation statistics.
pub struct ReconcileStatistics {
    /// Agent start time.
    start_time: Instant,

    runs: AtomicU64,
    aborted_runs: AtomicU64,
    restarts_requested: AtomicU64,

    /// Remote tiers used as `{}` across all runs.
    degraded_tiers: AtomicU64,

    remote_writes: AtomicU64,
    effective_writes: AtomicU64,

    last_run: Mutex<Option<LastRun>>,
}

impl ReconcileStatistics {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            runs: AtomicU64::new(0),
            aborted_runs: AtomicU64::new(0),
            restarts_requested: AtomicU64::new(0),
            degraded_tiers: AtomicU64::new(0),
            remote_writes: AtomicU64::new(0),
            effective_writes: AtomicU64::new(0),
            last_run: Mutex::new(None),
        }
    }

    /// Record a finished run.
    pub fn record(&self, trigger: TriggerSource, report: &ReconcileReport) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if report.is_aborted() {
            self.aborted_runs.fetch_add(1, Ordering::Relaxed);
        }
        if report.restart_requested {
            self.restarts_requested.fetch_add(1, Ordering::Relaxed);
        }
        self.degraded_tiers
            .fetch_add(report.degraded_tiers() as u64, Ordering::Relaxed);
        if report.remote_snapshot == PersistStatus::Written {
            self.remote_writes.fetch_add(1, Ordering::Relaxed);
        }
        if report.effective == PersistStatus::Written {
            self.effective_writes.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut last) = self.last_run.lock() {
            *last = Some(LastRun {
                run_id: report.run_id,
                trigger,
                finished_at: report.finished_at,
                outcome: report.outcome.clone(),
                restart_requested: report.restart_requested,
            });
        }
    }

    /// Get current statistics snapshot.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            aborted_runs: self.aborted_runs.load(Ordering::Relaxed),
            restarts_requested: self.restarts_requested.load(Ordering::Relaxed),
            degraded_tiers: self.degraded_tiers.load(Ordering::Relaxed),
            remote_writes: self.remote_writes.load(Ordering::Relaxed),
            effective_writes: self.effective_writes.load(Ordering::Relaxed),
            last_run: self.last_run.lock().ok().and_then(|last| last.clone()),
            uptime: self.start_time.elapsed().as_secs(),
            dropped_log_entries: 0,
        }
    }
}

impl Default for ReconcileStatistics {
    fn default() -> Self {
        Self::new()
    }
}
