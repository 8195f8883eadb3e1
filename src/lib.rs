pub mod config;
pub mod error;
pub mod logging;
pub mod monitoring;
pub mod server;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use logging::init_logging;
pub use monitoring::{
    Admission, AggregateMetrics, BackgroundTasks, HealthReport, HealthStatus, MonitorEvent,
    OperationMonitor, RejectReason,
};
