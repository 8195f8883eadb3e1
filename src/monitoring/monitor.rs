use super::events::{FailureKind, MonitorEvent};
use super::health::{evaluate, HealthReport};
use super::ledger::{ActiveOperation, Ledger, OperationRecord};
use super::memory::{MemoryProbe, SystemMemoryProbe};
use super::metrics::AggregateMetrics;
use crate::config::MonitorConfig;
use chrono::Utc;
use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Error description attached to janitor cleanups
pub const TIMEOUT_CLEANUP_ERROR: &str = "Operation timeout - cleaned up by janitor";

/// Why an operation was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ConcurrencyLimit,
    MemoryPressure,
    /// The id is already in flight
    DuplicateId,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ConcurrencyLimit => write!(f, "concurrency limit reached"),
            RejectReason::MemoryPressure => write!(f, "memory pressure"),
            RejectReason::DuplicateId => write!(f, "operation id already in flight"),
        }
    }
}

/// Outcome of an admission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Failure of a [`OperationMonitor::run_monitored`] call
#[derive(Debug)]
pub enum MonitoredError<E> {
    /// The work never ran
    Rejected(RejectReason),
    /// The work ran and returned an error, which was reported to the monitor
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for MonitoredError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoredError::Rejected(reason) => write!(f, "operation rejected: {}", reason),
            MonitoredError::Failed(err) => write!(f, "operation failed: {}", err),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for MonitoredError<E> {}

enum Outcome {
    Success { items_processed: u64 },
    Failure { error: String, kind: FailureKind },
}

#[derive(Default)]
struct MonitorState {
    ledger: Ledger,
    metrics: AggregateMetrics,
}

/// Admission gate, ledger and health aggregation for caller operations.
///
/// All mutations take a single lock, so admit/complete/fail/sweep/reset are
/// totally ordered and the ledger always matches `current_concurrency` when a
/// call returns. No method fails or panics on unknown ids.
pub struct OperationMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
    memory: Arc<dyn MemoryProbe>,
    events: broadcast::Sender<MonitorEvent>,
}

impl OperationMonitor {
    /// Create a monitor reading host memory through `sysinfo`
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_memory_probe(config, Arc::new(SystemMemoryProbe::new()))
    }

    pub fn with_memory_probe(config: MonitorConfig, memory: Arc<dyn MemoryProbe>) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            config,
            state: Mutex::new(MonitorState::default()),
            memory,
            events,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh unique id for callers that do not have their own
    pub fn next_operation_id(op_type: &str) -> String {
        format!("{}-{}", op_type, Uuid::new_v4())
    }

    /// Subscribe to completion and failure notifications
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Decide whether a new operation may start and record it if so.
    ///
    /// The memory probe is read without holding the state lock; the ceiling is
    /// checked again before inserting.
    pub fn try_admit(&self, id: &str, op_type: &str, item_count: u64) -> Admission {
        if let Some(rejection) = self.check_ceiling(&self.state(), id, op_type) {
            return rejection;
        }

        let memory_ratio = self.memory.sample().usage_ratio();
        if memory_ratio > self.config.memory_threshold {
            warn!(
                "Rejected operation {} ({}): memory pressure {:.1}% > {:.1}%",
                id,
                op_type,
                memory_ratio * 100.0,
                self.config.memory_threshold * 100.0
            );
            return Admission::Rejected(RejectReason::MemoryPressure);
        }

        let mut state = self.state();
        if let Some(rejection) = self.check_ceiling(&state, id, op_type) {
            return rejection;
        }
        if !state.ledger.insert(OperationRecord::new(id, op_type, item_count)) {
            warn!("Rejected operation {} ({}): id already in flight", id, op_type);
            return Admission::Rejected(RejectReason::DuplicateId);
        }
        state.metrics.record_admission();

        info!(
            "Started operation {} ({}, {} items), concurrency {}/{}",
            id, op_type, item_count, state.metrics.current_concurrency, self.config.max_concurrency
        );
        Admission::Admitted
    }

    fn check_ceiling(&self, state: &MonitorState, id: &str, op_type: &str) -> Option<Admission> {
        let current = state.metrics.current_concurrency;
        if current < self.config.max_concurrency as u64 {
            return None;
        }
        warn!(
            "Rejected operation {} ({}): concurrency limit {}/{}",
            id, op_type, current, self.config.max_concurrency
        );
        Some(Admission::Rejected(RejectReason::ConcurrencyLimit))
    }

    /// Record a successful terminal transition; unknown ids are ignored
    pub fn complete(&self, id: &str, items_processed: u64) {
        let event = {
            let mut state = self.state();
            Self::finish_locked(&mut state, id, Outcome::Success { items_processed })
        };
        if let Some(event) = event {
            self.publish(event);
        }
    }

    /// Record a caller-reported failure; unknown ids are ignored
    pub fn fail(&self, id: &str, error: &str) {
        self.fail_with(id, error, FailureKind::Reported);
    }

    fn fail_with(&self, id: &str, error: &str, kind: FailureKind) {
        let event = {
            let mut state = self.state();
            Self::finish_locked(
                &mut state,
                id,
                Outcome::Failure {
                    error: error.to_string(),
                    kind,
                },
            )
        };
        if let Some(event) = event {
            self.publish(event);
        }
    }

    fn finish_locked(state: &mut MonitorState, id: &str, outcome: Outcome) -> Option<MonitorEvent> {
        let Some(record) = state.ledger.remove(id) else {
            debug!("Ignoring terminal report for unknown operation {}", id);
            return None;
        };
        let duration = record.elapsed();

        let event = match outcome {
            Outcome::Success { items_processed } => {
                state.metrics.record_success(duration);
                MonitorEvent::OperationComplete {
                    id: record.id,
                    op_type: record.op_type,
                    duration,
                    items_processed,
                }
            }
            Outcome::Failure { error, kind } => {
                state.metrics.record_failure(duration);
                MonitorEvent::OperationFailed {
                    id: record.id,
                    op_type: record.op_type,
                    duration,
                    error,
                    kind,
                }
            }
        };
        Some(event)
    }

    fn publish(&self, event: MonitorEvent) {
        let threshold = self.config.response_time_threshold;
        match &event {
            MonitorEvent::OperationComplete {
                id,
                op_type,
                duration,
                items_processed,
            } => {
                info!(
                    "Completed operation {} ({}): {} items in {}ms",
                    id,
                    op_type,
                    items_processed,
                    duration.as_millis()
                );
                if *duration > threshold {
                    warn!(
                        "Slow operation {} ({}): {}ms exceeds {}ms",
                        id,
                        op_type,
                        duration.as_millis(),
                        threshold.as_millis()
                    );
                }
            }
            MonitorEvent::OperationFailed {
                id,
                op_type,
                duration,
                error,
                kind,
            } => match kind {
                FailureKind::Reported => warn!(
                    "Failed operation {} ({}) after {}ms: {}",
                    id,
                    op_type,
                    duration.as_millis(),
                    error
                ),
                FailureKind::Cancelled => warn!(
                    "Operation {} ({}) dropped before reporting, failed after {}ms",
                    id,
                    op_type,
                    duration.as_millis()
                ),
                FailureKind::TimeoutCleanup => warn!(
                    "Cleaned up stuck operation {} ({}) after {}ms",
                    id,
                    op_type,
                    duration.as_millis()
                ),
            },
        }

        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Force-fail every operation older than the stuck threshold.
    ///
    /// Returns how many operations were removed.
    pub fn sweep_stuck_operations(&self) -> usize {
        let events: Vec<MonitorEvent> = {
            let mut state = self.state();
            let stuck = state.ledger.older_than(self.config.stuck_threshold());
            stuck
                .iter()
                .filter_map(|id| {
                    Self::finish_locked(
                        &mut state,
                        id,
                        Outcome::Failure {
                            error: TIMEOUT_CLEANUP_ERROR.to_string(),
                            kind: FailureKind::TimeoutCleanup,
                        },
                    )
                })
                .collect()
        };

        let removed = events.len();
        for event in events {
            self.publish(event);
        }
        if removed > 0 {
            info!("Janitor removed {} stuck operation(s)", removed);
        }
        removed
    }

    /// Current health with a fresh memory sample
    pub fn health(&self) -> HealthReport {
        let memory = self.memory.sample();
        let timestamp = Utc::now();

        let (metrics, active_operations) = {
            let mut state = self.state();
            state.metrics.record_memory(memory);
            state.metrics.last_health_check = Some(timestamp);
            (state.metrics.clone(), state.ledger.snapshot())
        };

        let (status, recommendations) = evaluate(&self.config, &metrics, &active_operations);
        debug!(
            "Health check: {:?}, {} active, {} recommendation(s)",
            status,
            active_operations.len(),
            recommendations.len()
        );

        HealthReport {
            status,
            timestamp,
            metrics,
            active_operations,
            recommendations,
        }
    }

    pub fn metrics(&self) -> AggregateMetrics {
        self.state().metrics.clone()
    }

    pub fn active_operations(&self) -> Vec<ActiveOperation> {
        self.state().ledger.snapshot()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.state().ledger.contains(id)
    }

    /// Zero cumulative counters; in-flight operations keep counting
    pub fn reset_metrics(&self) {
        let mut state = self.state();
        state.metrics.reset();
        info!(
            "Metrics reset with {} operation(s) still in flight",
            state.metrics.current_concurrency
        );
    }

    /// One-line summary for the periodic log
    pub fn summary_line(&self) -> String {
        let metrics = self.metrics();
        format!(
            "Operations: total={} ok={} failed={} active={} peak={} avg={:.1}ms error_rate={:.1}%",
            metrics.total_operations,
            metrics.successful_operations,
            metrics.failed_operations,
            metrics.current_concurrency,
            metrics.peak_concurrency,
            metrics.average_response_time,
            metrics.error_rate() * 100.0
        )
    }

    /// Admit, run `work`, and report its outcome.
    ///
    /// On success the operation is completed with `item_count` items processed;
    /// on error it is failed with the error's `Display` text. Rejected work is
    /// never polled. If this future is dropped before `work` finishes, or `work`
    /// panics, the operation is failed with [`CANCELLED_ERROR`].
    pub async fn run_monitored<T, E, F>(
        &self,
        op_type: &str,
        item_count: u64,
        work: F,
    ) -> Result<T, MonitoredError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let id = Self::next_operation_id(op_type);
        if let Admission::Rejected(reason) = self.try_admit(&id, op_type, item_count) {
            return Err(MonitoredError::Rejected(reason));
        }

        let guard = InFlightGuard {
            monitor: self,
            id: &id,
            armed: true,
        };

        let result = work.await;
        guard.disarm();

        match result {
            Ok(value) => {
                self.complete(&id, item_count);
                Ok(value)
            }
            Err(err) => {
                self.fail(&id, &err.to_string());
                Err(MonitoredError::Failed(err))
            }
        }
    }
}

/// Error description for operations whose monitored future was dropped
pub const CANCELLED_ERROR: &str = "operation cancelled";

/// Fails the operation on drop unless disarmed
struct InFlightGuard<'a> {
    monitor: &'a OperationMonitor,
    id: &'a str,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.monitor
                .fail_with(self.id, CANCELLED_ERROR, FailureKind::Cancelled);
        }
    }
}
