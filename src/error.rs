use std::fmt;

/// Errors raised around the monitor (configuration, logging setup, HTTP surface).
///
/// The monitor's own bookkeeping never produces one of these: rejections are
/// returned as [`crate::monitoring::Admission`] values and unknown operation ids
/// are ignored.
#[derive(Debug)]
pub enum MonitorError {
    /// A configuration value is missing, malformed or out of range
    Config(String),
    /// The logger could not be installed
    Logging(String),
    /// The HTTP health surface failed to bind or serve
    Server(String),
    Io(std::io::Error),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Config(msg) => write!(f, "invalid monitor configuration: {}", msg),
            MonitorError::Logging(msg) => write!(f, "failed to initialise logging: {}", msg),
            MonitorError::Server(msg) => write!(f, "health server error: {}", msg),
            MonitorError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(error: std::io::Error) -> Self {
        MonitorError::Io(error)
    }
}

impl From<log::SetLoggerError> for MonitorError {
    fn from(error: log::SetLoggerError) -> Self {
        MonitorError::Logging(error.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(error: serde_json::Error) -> Self {
        MonitorError::Config(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
