use super::ledger::{millis_u64, ActiveOperation};
use super::metrics::AggregateMetrics;
use crate::config::MonitorConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Raise the status to `other` if it is more severe
    fn escalate(&mut self, other: HealthStatus) {
        if other > *self {
            *self = other;
        }
    }
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub metrics: AggregateMetrics,
    pub active_operations: Vec<ActiveOperation>,
    pub recommendations: Vec<String>,
}

/// Derive status and recommendations from a metrics snapshot.
///
/// Every triggered condition adds its own recommendation. Memory pressure is
/// critical; everything else is a warning.
pub fn evaluate(
    config: &MonitorConfig,
    metrics: &AggregateMetrics,
    active_operations: &[ActiveOperation],
) -> (HealthStatus, Vec<String>) {
    let mut status = HealthStatus::Healthy;
    let mut recommendations = Vec::new();

    let concurrency_ratio = metrics.concurrency_ratio(config.max_concurrency);
    if concurrency_ratio > config.concurrency_warning_ratio {
        status.escalate(HealthStatus::Warning);
        recommendations.push(format!(
            "High concurrency: {}/{} operations in flight. Queue new work or raise max_concurrency.",
            metrics.current_concurrency, config.max_concurrency
        ));
    }

    let error_rate = metrics.error_rate();
    if error_rate > config.error_rate_warning {
        status.escalate(HealthStatus::Warning);
        recommendations.push(format!(
            "High error rate: {:.1}% of operations failed. Check provider and database connectivity.",
            error_rate * 100.0
        ));
    }

    let threshold_ms = millis_u64(config.response_time_threshold);
    let slow = active_operations
        .iter()
        .filter(|op| op.elapsed_ms > threshold_ms)
        .count();
    if slow > 0 {
        status.escalate(HealthStatus::Warning);
        recommendations.push(format!(
            "{} operation(s) running longer than {}ms. Investigate slow provider calls.",
            slow, threshold_ms
        ));
    }

    let memory_ratio = metrics.memory_usage.usage_ratio();
    if memory_ratio > config.memory_threshold {
        status.escalate(HealthStatus::Critical);
        recommendations.push(format!(
            "Memory pressure: {:.1}% in use. Reduce batch sizes or restart workers.",
            memory_ratio * 100.0
        ));
    }

    (status, recommendations)
}
