//! Tracked state reconciliation
//!
//! Every tick loads the tracked states and checks the ones that are due:
//! all of them on a full sweep, otherwise only those flagged for a forced
//! recheck. A check fetches the state blob only if its modification token
//! moved, converts and checks it, and records the outcome.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use super::validation::{evaluate, EvaluationError};
use crate::compliance::{select_features, EmptyRunPolicy};
use crate::daemon::logging::DaemonLogger;
use crate::fetch::{fetch_if_changed, FetchError, FetchOutcome, ObjectLocation, ObjectStore};
use crate::models::{CheckStatus, ComplianceFeature, TrackedState, ValidationLogEntry};
use crate::notify::Notifier;
use crate::store::{RecordStore, Store, StoreError};
use crate::tooling::ToolInvoker;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Can't persist check results: {0}")]
    Persistence(#[from] StoreError),
}

/// What a tick processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Every tracked state
    Full,
    /// Only states with `force_recheck` set
    ForcedOnly,
}

/// Tracks when the last full sweep happened
#[derive(Debug, Clone)]
pub struct SweepScheduler {
    last_full_sweep: Option<Instant>,
    full_sweep_interval: Duration,
}

impl SweepScheduler {
    pub fn new(full_sweep_interval: Duration) -> Self {
        Self {
            last_full_sweep: None,
            full_sweep_interval,
        }
    }

    /// Classify the tick happening at `now`, recording it if it is a full sweep
    pub fn next_sweep(&mut self, now: Instant) -> SweepKind {
        let due = match self.last_full_sweep {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.full_sweep_interval,
        };

        if due {
            self.last_full_sweep = Some(now);
            SweepKind::Full
        } else {
            SweepKind::ForcedOnly
        }
    }
}

/// Result of checking one state
#[derive(Debug, Clone)]
pub enum StateCheckOutcome {
    /// The object did not change and no recheck was forced
    Unchanged,
    /// Conversion or checking failed; the failure is stored on the state
    Failed { message: String },
    /// A log entry was recorded and the state advanced
    Checked {
        /// Content or result differ from what the state held before
        changed: bool,
        entry: ValidationLogEntry,
    },
}

/// Counters for one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub errors: usize,
}

/// Checks tracked states against the object store
pub struct StateChecker<S, O> {
    store: Arc<S>,
    objects: Arc<O>,
    tools: ToolInvoker,
    policy: EmptyRunPolicy,
    notifier: Option<Arc<dyn Notifier>>,
    logger: DaemonLogger,
}

impl<S, O> StateChecker<S, O>
where
    S: Store + 'static,
    O: ObjectStore + 'static,
{
    pub fn new(store: Arc<S>, objects: Arc<O>, tools: ToolInvoker, policy: EmptyRunPolicy) -> Self {
        Self {
            store,
            objects,
            tools,
            policy,
            notifier: None,
            logger: DaemonLogger::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_logger(mut self, logger: DaemonLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Reconcile one tracked state.
    ///
    /// The log entry is written before the state is advanced, so a failed
    /// log write leaves the state to be retried on the next sweep. If the
    /// state itself cannot be saved the entry is removed again, so the retry
    /// does not leave a duplicate behind.
    pub async fn check_state(&self, mut state: TrackedState) -> Result<StateCheckOutcome, CheckError> {
        let location = ObjectLocation::new(&state.bucket, &state.path);
        let previous_token = if state.force_recheck {
            ""
        } else {
            state.last_modification.as_str()
        };

        let (content, token) = match fetch_if_changed(self.objects.as_ref(), &location, previous_token).await? {
            FetchOutcome::Unchanged { .. } => return Ok(StateCheckOutcome::Unchanged),
            FetchOutcome::Changed { content, token } => (content, token),
        };

        let features = self.store.load_all_lossy::<ComplianceFeature>().await?;
        let selected = select_features(&features, &state.tags);

        let evaluation = match evaluate(&self.tools, &content, &selected, self.policy).await {
            Ok(evaluation) => evaluation,
            Err(e) => return self.record_failure(state, &e).await,
        };

        let new_status = CheckStatus::Checked {
            result: evaluation.result.clone(),
        };
        let changed = evaluation.state_json != state.state_json || new_status != state.status;

        let entry = ValidationLogEntry::state_check(evaluation.state_json.clone(), evaluation.result, &state);
        self.store.save(&entry).await?;

        state.force_recheck = false;
        state.last_checked = Some(Utc::now());
        state.state_json = evaluation.state_json;
        state.status = new_status;
        state.last_modification = token;
        if let Err(e) = self.store.save(&state).await {
            if let Err(cleanup) = self.store.remove::<ValidationLogEntry>(&entry.id).await {
                self.logger.log_error(
                    &format!("Can't remove log entry {} after failed state save: {}", entry.id, cleanup),
                    Some(&state.location()),
                );
            }
            return Err(e.into());
        }

        self.logger.log_state_checked(&state, &entry, changed);
        self.notify_if_failing(&state, &entry).await;

        Ok(StateCheckOutcome::Checked { changed, entry })
    }

    async fn record_failure(
        &self,
        mut state: TrackedState,
        error: &EvaluationError,
    ) -> Result<StateCheckOutcome, CheckError> {
        let message = format!("failed: {}", error);
        state.force_recheck = false;
        state.status = CheckStatus::Failed {
            message: message.clone(),
        };
        self.store.save(&state).await?;

        self.logger.log_state_check_failed(&state, &error.to_string());
        Ok(StateCheckOutcome::Failed { message })
    }

    async fn notify_if_failing(&self, state: &TrackedState, entry: &ValidationLogEntry) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if entry.result.error_count() == 0 {
            return;
        }
        if let Err(e) = notifier.notify_failure(state, entry).await {
            self.logger
                .log_error(&format!("Can't send failure notification: {}", e), Some(&state.location()));
        }
    }

    /// Run one tick of the given kind; per-state errors are logged and counted
    pub async fn run_tick(&self, kind: SweepKind) -> TickReport {
        let mut report = TickReport::default();

        let states = match self.store.load_all_lossy::<TrackedState>().await {
            Ok(states) => states,
            Err(e) => {
                self.logger.log_error(&format!("Can't load tracked states: {}", e), None);
                report.errors += 1;
                return report;
            }
        };

        for state in states {
            if kind == SweepKind::ForcedOnly && !state.force_recheck {
                continue;
            }

            let id = state.id.clone();
            let location = state.location();
            match self.check_state(state).await {
                Ok(StateCheckOutcome::Unchanged) => report.unchanged += 1,
                Ok(StateCheckOutcome::Failed { .. }) => report.failed += 1,
                Ok(StateCheckOutcome::Checked { changed, .. }) => {
                    report.checked += 1;
                    if changed {
                        report.changed += 1;
                    }
                }
                Err(e) => {
                    report.errors += 1;
                    self.logger.log_error(
                        &format!("Can't check state {} ({}): {}", id, location, e),
                        Some("state_loop"),
                    );
                }
            }
        }

        report
    }
}

/// Tick every `poll_interval` until the task is dropped
pub async fn run_state_loop<S, O>(
    checker: Arc<StateChecker<S, O>>,
    mut scheduler: SweepScheduler,
    poll_interval: Duration,
) where
    S: Store + 'static,
    O: ObjectStore + 'static,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let kind = scheduler.next_sweep(Instant::now());
        let report = checker.run_tick(kind).await;
        if kind == SweepKind::Full {
            log::debug!(
                "Full sweep done: {} checked ({} changed), {} unchanged, {} failed, {} errors",
                report.checked,
                report.changed,
                report.unchanged,
                report.failed,
                report.errors
            );
        }
    }
}
