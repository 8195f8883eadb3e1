use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why an operation ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Reported by the caller through `fail`
    Reported,
    /// The monitored future was dropped or panicked before reporting
    Cancelled,
    /// Force-failed by the janitor after running too long
    TimeoutCleanup,
}

/// Terminal transition notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum MonitorEvent {
    #[serde(rename_all = "camelCase")]
    OperationComplete {
        id: String,
        #[serde(rename = "type")]
        op_type: String,
        #[serde(rename = "durationMs", with = "duration_ms")]
        duration: Duration,
        items_processed: u64,
    },
    #[serde(rename_all = "camelCase")]
    OperationFailed {
        id: String,
        #[serde(rename = "type")]
        op_type: String,
        #[serde(rename = "durationMs", with = "duration_ms")]
        duration: Duration,
        error: String,
        kind: FailureKind,
    },
}

impl MonitorEvent {
    pub fn id(&self) -> &str {
        match self {
            MonitorEvent::OperationComplete { id, .. } => id,
            MonitorEvent::OperationFailed { id, .. } => id,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            MonitorEvent::OperationComplete { duration, .. } => *duration,
            MonitorEvent::OperationFailed { duration, .. } => *duration,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MonitorEvent::OperationFailed { .. })
    }
}

/// Durations on the wire are whole milliseconds, like `elapsedMs`
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(crate::monitoring::ledger::millis_u64(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
