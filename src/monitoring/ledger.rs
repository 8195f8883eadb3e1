use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// One in-flight unit of caller work
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub id: String,
    /// Free-form grouping label, e.g. "bulk-order-sync"
    pub op_type: String,
    /// Items the caller expects to process; informational only
    pub item_count: u64,
    /// Monotonic admission instant used for durations
    pub start_time: Instant,
    /// Wall-clock admission time for reporting
    pub started_at: DateTime<Utc>,
}

impl OperationRecord {
    pub fn new(id: &str, op_type: &str, item_count: u64) -> Self {
        Self {
            id: id.to_string(),
            op_type: op_type.to_string(),
            item_count,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Time since admission
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.start_time)
    }
}

/// Serializable view of an in-flight operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub op_type: String,
    pub item_count: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl From<&OperationRecord> for ActiveOperation {
    fn from(record: &OperationRecord) -> Self {
        Self {
            id: record.id.clone(),
            op_type: record.op_type.clone(),
            item_count: record.item_count,
            started_at: record.started_at,
            elapsed_ms: millis_u64(record.elapsed()),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
pub(crate) fn millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// In-memory set of in-flight operations keyed by caller id
#[derive(Debug, Default)]
pub struct Ledger {
    records: HashMap<String, OperationRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; returns false and leaves the ledger untouched if the id is taken
    pub fn insert(&mut self, record: OperationRecord) -> bool {
        if self.records.contains_key(&record.id) {
            return false;
        }
        self.records.insert(record.id.clone(), record);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<OperationRecord> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of operations running longer than `threshold`
    pub fn older_than(&self, threshold: Duration) -> Vec<String> {
        self.records
            .values()
            .filter(|record| record.elapsed() > threshold)
            .map(|record| record.id.clone())
            .collect()
    }

    /// Snapshot of all in-flight operations, oldest first
    pub fn snapshot(&self) -> Vec<ActiveOperation> {
        let mut records: Vec<&OperationRecord> = self.records.values().collect();
        records.sort_by_key(|record| record.start_time);
        records.into_iter().map(ActiveOperation::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut ledger = Ledger::new();
        assert!(ledger.insert(OperationRecord::new("op-1", "bulk-order-sync", 10)));
        assert!(!ledger.insert(OperationRecord::new("op-1", "status-refresh", 3)));

        assert_eq!(ledger.len(), 1);
        let kept = ledger.remove("op-1").unwrap();
        assert_eq!(kept.op_type, "bulk-order-sync");
        assert_eq!(kept.item_count, 10);
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut ledger = Ledger::new();
        assert!(ledger.remove("ghost").is_none());
        assert!(ledger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_than_and_snapshot_order() {
        let mut ledger = Ledger::new();
        ledger.insert(OperationRecord::new("old", "sync", 1));
        tokio::time::advance(Duration::from_secs(30)).await;
        ledger.insert(OperationRecord::new("new", "sync", 1));
        tokio::time::advance(Duration::from_secs(1)).await;

        let stuck = ledger.older_than(Duration::from_secs(20));
        assert_eq!(stuck, vec!["old".to_string()]);

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "old");
        assert_eq!(snapshot[0].elapsed_ms, 31_000);
        assert_eq!(snapshot[1].elapsed_ms, 1_000);
    }

    #[test]
    fn test_millis_saturate_instead_of_wrapping() {
        assert_eq!(millis_u64(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis_u64(Duration::MAX), u64::MAX);
        // u64::MAX + 1 ms would wrap to 0 with a plain cast
        let just_over = Duration::from_millis(u64::MAX) + Duration::from_millis(1);
        assert_eq!(millis_u64(just_over), u64::MAX);
    }

    #[test]
    fn test_active_operation_json_shape() {
        let record = OperationRecord::new("op-9", "provider-refill", 4);
        let json = serde_json::to_value(ActiveOperation::from(&record)).unwrap();
        assert_eq!(json["type"], "provider-refill");
        assert_eq!(json["itemCount"], 4);
        assert!(json.get("elapsedMs").is_some());
    }
}
