//! Reconciliation orchestrator.
//!
//! One run walks the tiers in a fixed, linear order:
//!
//! ```text
//! Start → FetchRemoteTiers → MergeRemote → CompareRemote → LoadBootstrap
//!       → (PersistRemote) → MergeEffective → CompareEffective
//!       → (PersistEffective → RequestRestart) → Done
//! ```
//!
//! Remote tiers are best effort: a tier that cannot be fetched or parsed
//! contributes an empty document. Local authority is not: a missing bootstrap
//! or a failed effective write ends the run in `AbortedFatal`. The bootstrap
//! is read before anything is persisted, so an aborted run never leaves a
//! partial write behind, and a restart is only requested after the effective
//! configuration is safely stored.
//!
//! The engine is blocking and single-threaded. Callers must not start a run
//! while another one is in progress.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::device::{Clock, RestartRequester, SystemClock};
use crate::document::{documents_equal, empty_document, parse_object, serialize, Document};
use crate::error::ConfigError;
use crate::fetch::{global_url, instance_url, RemoteFetcher};
use crate::merge::{merge, MergeOptions};
use crate::model::{RemoteSources, StorageKeys, Tier};
use crate::store::SnapshotStore;

/// Steps of a reconciliation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Start,
    FetchRemoteTiers,
    MergeRemote,
    CompareRemote,
    LoadBootstrap,
    PersistRemote,
    MergeEffective,
    CompareEffective,
    PersistEffective,
    RequestRestart,
    Done,
    AbortedFatal,
}

/// What happened to one remote tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum TierStatus {
    /// Fetched and parsed.
    Fetched { bytes: usize },
    /// No URL could be built for the tier.
    Skipped { reason: String },
    /// Transport failure; tier used as empty.
    FetchFailed { reason: String },
    /// Malformed document; tier used as empty.
    ParseFailed { reason: String },
}

impl TierStatus {
    /// Whether the tier fell back to the empty document.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, TierStatus::Fetched { .. })
    }
}

/// What happened to a persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PersistStatus {
    /// Computed document matched the stored one; nothing written.
    Unchanged,
    /// New document written.
    Written,
    /// Write attempted and failed.
    Failed { reason: String },
    /// The run ended before this stage.
    NotReached,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum RunOutcome {
    Done,
    AbortedFatal { reason: String },
}

/// Summary of one reconciliation run, returned to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub global: TierStatus,
    pub instance: TierStatus,
    pub remote_snapshot: PersistStatus,
    pub effective: PersistStatus,
    /// Set when the run asked the device to restart. Callers that own the
    /// process should stop doing work once they see this.
    pub restart_requested: bool,
    pub outcome: RunOutcome,
    pub states: Vec<RunState>,
}

impl ReconcileReport {
    fn begin(run_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at: now,
            finished_at: now,
            global: TierStatus::Skipped {
                reason: "not fetched".to_string(),
            },
            instance: TierStatus::Skipped {
                reason: "not fetched".to_string(),
            },
            remote_snapshot: PersistStatus::NotReached,
            effective: PersistStatus::NotReached,
            restart_requested: false,
            outcome: RunOutcome::Done,
            states: vec![RunState::Start],
        }
    }

    fn enter(&mut self, state: RunState) {
        debug!(?state, "reconcile step");
        self.states.push(state);
    }

    /// Whether the run ended in `AbortedFatal`.
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, RunOutcome::AbortedFatal { .. })
    }

    /// Number of remote tiers that fell back to the empty document.
    pub fn degraded_tiers(&self) -> usize {
        [&self.global, &self.instance]
            .iter()
            .filter(|status| status.is_degraded())
            .count()
    }
}

/// Drives reconciliation runs against injected collaborators.
pub struct Reconciler<F, S, R, C = SystemClock> {
    fetcher: F,
    store: S,
    restart: R,
    clock: C,
    options: MergeOptions,
    sources: RemoteSources,
    keys: StorageKeys,
}

impl<F, S, R> Reconciler<F, S, R, SystemClock>
where
    F: RemoteFetcher,
    S: SnapshotStore,
    R: RestartRequester,
{
    /// Create a reconciler with default storage keys and the system clock.
    pub fn new(
        fetcher: F,
        store: S,
        restart: R,
        options: MergeOptions,
        sources: RemoteSources,
    ) -> Self {
        Self {
            fetcher,
            store,
            restart,
            clock: SystemClock,
            options,
            sources,
            keys: StorageKeys::default(),
        }
    }
}

impl<F, S, R, C> Reconciler<F, S, R, C>
where
    F: RemoteFetcher,
    S: SnapshotStore,
    R: RestartRequester,
    C: Clock,
{
    /// Use different storage key names.
    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Use a different clock.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Reconciler<F, S, R, C2> {
        Reconciler {
            fetcher: self.fetcher,
            store: self.store,
            restart: self.restart,
            clock,
            options: self.options,
            sources: self.sources,
            keys: self.keys,
        }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one full reconciliation run.
    pub fn run(&self) -> ReconcileReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("reconcile", %run_id);
        let _guard = span.enter();

        let mut report = ReconcileReport::begin(run_id, self.clock.now());
        info!(
            base_url = %self.sources.base_url(),
            location = %self.sources.location_name(),
            "reconciliation started"
        );

        self.execute(&mut report);

        report.finished_at = self.clock.now();
        report.states.push(match report.outcome {
            RunOutcome::Done => RunState::Done,
            RunOutcome::AbortedFatal { .. } => RunState::AbortedFatal,
        });
        info!(
            outcome = ?report.outcome,
            restart_requested = report.restart_requested,
            "reconciliation finished"
        );
        report
    }

    fn execute(&self, report: &mut ReconcileReport) {
        // Remote tiers: failures degrade to empty documents.
        report.enter(RunState::FetchRemoteTiers);
        let (global_doc, global_status) = self.fetch_tier(Tier::Global, self.tier_url(Tier::Global));
        let (instance_doc, instance_status) =
            self.fetch_tier(Tier::Instance, self.tier_url(Tier::Instance));
        report.global = global_status;
        report.instance = instance_status;

        report.enter(RunState::MergeRemote);
        let remote = merge(&global_doc, &instance_doc, &self.options);

        report.enter(RunState::CompareRemote);
        let previous_remote = self.load_previous(&self.keys.remote_snapshot, "remote snapshot");
        let remote_changed = !documents_equal(&remote, &previous_remote);
        if remote_changed {
            info!(key = %self.keys.remote_snapshot, "remote config changed");
        } else {
            info!(key = %self.keys.remote_snapshot, "remote config unchanged; no persist");
            report.remote_snapshot = PersistStatus::Unchanged;
        }

        // Local authority must be readable before anything is written.
        report.enter(RunState::LoadBootstrap);
        let bootstrap = match self.load_bootstrap() {
            Ok(doc) => doc,
            Err(e) => {
                error!(key = %self.keys.bootstrap, error = %e, "bootstrap unavailable; aborting run");
                report.outcome = RunOutcome::AbortedFatal {
                    reason: e.to_string(),
                };
                return;
            }
        };

        if remote_changed {
            report.enter(RunState::PersistRemote);
            report.remote_snapshot = match self.persist(&self.keys.remote_snapshot, &remote) {
                Ok(()) => {
                    info!(key = %self.keys.remote_snapshot, "remote snapshot persisted");
                    PersistStatus::Written
                }
                Err(e) => {
                    error!(
                        key = %self.keys.remote_snapshot,
                        error = %e,
                        "remote snapshot write failed; continuing"
                    );
                    PersistStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
        }

        report.enter(RunState::MergeEffective);
        let effective = merge(&bootstrap, &remote, &self.options);

        report.enter(RunState::CompareEffective);
        let previous_effective = self.load_previous(&self.keys.effective, "effective config");
        if documents_equal(&effective, &previous_effective) {
            info!(key = %self.keys.effective, "effective config unchanged; no persist, no restart");
            report.effective = PersistStatus::Unchanged;
            return;
        }

        report.enter(RunState::PersistEffective);
        if let Err(e) = self.persist(&self.keys.effective, &effective) {
            error!(
                key = %self.keys.effective,
                error = %e,
                "effective config write failed; not restarting"
            );
            report.effective = PersistStatus::Failed {
                reason: e.to_string(),
            };
            report.outcome = RunOutcome::AbortedFatal {
                reason: e.to_string(),
            };
            return;
        }
        report.effective = PersistStatus::Written;
        info!(key = %self.keys.effective, "effective config persisted; requesting restart");

        report.enter(RunState::RequestRestart);
        self.restart.request();
        report.restart_requested = true;
    }

    fn tier_url(&self, tier: Tier) -> Result<String, String> {
        let base = self.sources.base_url();
        if base.is_empty() {
            return Err("config url is empty".to_string());
        }
        match tier {
            Tier::Global => Ok(global_url(base)),
            Tier::Instance if self.sources.location_name().is_empty() => {
                Err("location name is empty".to_string())
            }
            Tier::Instance => Ok(instance_url(base, self.sources.location_name())),
            Tier::Bootstrap => Err("bootstrap is local".to_string()),
        }
    }

    fn fetch_tier(&self, tier: Tier, url: Result<String, String>) -> (Document, TierStatus) {
        let url = match url {
            Ok(url) => url,
            Err(reason) => {
                warn!(%tier, %reason, "remote tier skipped; using empty document");
                return (empty_document(), TierStatus::Skipped { reason });
            }
        };

        let body = match self.fetcher.fetch(&url) {
            Ok(body) if body.trim().is_empty() => {
                let e = ConfigError::transport(&url, "empty response body");
                warn!(%tier, %url, error = %e, "remote tier fetch failed; using empty document");
                return (
                    empty_document(),
                    TierStatus::FetchFailed {
                        reason: e.to_string(),
                    },
                );
            }
            Ok(body) => body,
            Err(e) => {
                warn!(%tier, %url, error = %e, "remote tier fetch failed; using empty document");
                return (
                    empty_document(),
                    TierStatus::FetchFailed {
                        reason: e.to_string(),
                    },
                );
            }
        };

        match parse_object(&body) {
            Ok(doc) => {
                info!(%tier, %url, bytes = body.len(), "remote tier fetched");
                (doc, TierStatus::Fetched { bytes: body.len() })
            }
            Err(e) => {
                warn!(%tier, %url, error = %e, "remote tier parse failed; using empty document");
                (
                    empty_document(),
                    TierStatus::ParseFailed {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Previously persisted document, or `{}` when absent or unusable.
    fn load_previous(&self, key: &str, label: &str) -> Document {
        let text = match self.store.read(key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                info!(%key, "no previous {}", label);
                return empty_document();
            }
            Err(e) => {
                warn!(%key, error = %e, "previous {} unreadable; comparing against empty", label);
                return empty_document();
            }
        };
        match parse_object(&text) {
            Ok(doc) => {
                info!(%key, "previous {} found", label);
                doc
            }
            Err(e) => {
                warn!(%key, error = %e, "previous {} malformed; comparing against empty", label);
                empty_document()
            }
        }
    }

    fn load_bootstrap(&self) -> Result<Document, ConfigError> {
        let key = &self.keys.bootstrap;
        let text = self
            .store
            .read(key)?
            .ok_or_else(|| ConfigError::local_store(key, "bootstrap document not found"))?;
        let doc = parse_object(&text).map_err(|e| ConfigError::local_store(key, e.to_string()))?;
        info!(%key, "bootstrap loaded");
        Ok(doc)
    }

    fn persist(&self, key: &str, doc: &Document) -> Result<(), ConfigError> {
        self.store.write(key, &serialize(doc)).map_err(|e| match e {
            ConfigError::Persist { .. } => e,
            other => ConfigError::persist(key, other.to_string()),
        })
    }
}
