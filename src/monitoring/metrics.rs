use super::memory::MemorySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide running counters for monitored operations.
///
/// Outside a mutating call, `total_operations == successful_operations +
/// failed_operations + current_concurrency`, except right after [`reset`]
/// while operations admitted before the reset are still in flight.
///
/// [`reset`]: AggregateMetrics::reset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    /// Admitted operations (rejections are not counted)
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub current_concurrency: u64,
    /// High-water mark of `current_concurrency` since the last reset
    pub peak_concurrency: u64,
    /// Running mean over all terminal operations, in milliseconds
    pub average_response_time: f64,
    /// Last sampled memory reading
    pub memory_usage: MemorySnapshot,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl AggregateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admission(&mut self) {
        self.total_operations += 1;
        self.current_concurrency += 1;
        if self.current_concurrency > self.peak_concurrency {
            self.peak_concurrency = self.current_concurrency;
        }
    }

    pub fn record_success(&mut self, duration: Duration) {
        self.successful_operations += 1;
        self.finish(duration);
    }

    pub fn record_failure(&mut self, duration: Duration) {
        self.failed_operations += 1;
        self.finish(duration);
    }

    fn finish(&mut self, duration: Duration) {
        self.current_concurrency = self.current_concurrency.saturating_sub(1);

        let completed = self.terminal_operations();
        let millis = duration.as_secs_f64() * 1000.0;
        if completed <= 1 {
            self.average_response_time = millis;
        } else {
            let previous = (completed - 1) as f64;
            self.average_response_time =
                (self.average_response_time * previous + millis) / completed as f64;
        }
    }

    /// Successful plus failed operations
    pub fn terminal_operations(&self) -> u64 {
        self.successful_operations + self.failed_operations
    }

    /// Failed operations over admitted operations (0 when nothing was admitted)
    pub fn error_rate(&self) -> f64 {
        self.failed_operations as f64 / self.total_operations.max(1) as f64
    }

    pub fn concurrency_ratio(&self, max_concurrency: usize) -> f64 {
        self.current_concurrency as f64 / max_concurrency.max(1) as f64
    }

    pub fn record_memory(&mut self, snapshot: MemorySnapshot) {
        self.memory_usage = snapshot;
    }

    /// Zero the cumulative counters, keeping the in-flight count
    pub fn reset(&mut self) {
        let current_concurrency = self.current_concurrency;
        let memory_usage = self.memory_usage;
        let last_health_check = self.last_health_check;
        *self = Self {
            current_concurrency,
            memory_usage,
            last_health_check,
            ..Self::default()
        };
    }
}
