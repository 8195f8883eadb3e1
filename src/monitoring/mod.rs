//! Operation admission, ledger, health evaluation and janitor
pub mod events;
pub mod health;
pub mod janitor;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod monitor;

pub use events::{FailureKind, MonitorEvent};
pub use health::{HealthReport, HealthStatus};
pub use janitor::BackgroundTasks;
pub use ledger::{ActiveOperation, OperationRecord};
pub use memory::{FixedMemoryProbe, MemoryProbe, MemorySnapshot, SystemMemoryProbe};
pub use metrics::AggregateMetrics;
pub use monitor::{
    Admission, MonitoredError, OperationMonitor, RejectReason, CANCELLED_ERROR,
    TIMEOUT_CLEANUP_ERROR,
};
