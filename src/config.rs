use crate::error::{MonitorError, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `SMM_MONITOR_MAX_CONCURRENCY=80`
pub const ENV_PREFIX: &str = "SMM_MONITOR_";

/// Operation monitor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Maximum number of simultaneously in-flight operations
    pub max_concurrency: usize,
    /// Duration above which an operation counts as slow
    pub response_time_threshold: Duration,
    /// Memory used/total ratio above which admission is refused and health is critical
    pub memory_threshold: f64,
    /// Janitor sweep interval
    pub sweep_interval: Duration,
    /// Summary log interval
    pub summary_interval: Duration,
    /// Concurrency ratio above which health degrades to warning
    pub concurrency_warning_ratio: f64,
    /// Error rate above which health degrades to warning
    pub error_rate_warning: f64,
    /// Operations older than `stuck_multiplier * response_time_threshold` are swept
    pub stuck_multiplier: u32,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 50,
            response_time_threshold: Duration::from_millis(10_000),
            memory_threshold: 0.85,
            sweep_interval: Duration::from_secs(5 * 60),
            summary_interval: Duration::from_secs(10 * 60),
            concurrency_warning_ratio: 0.8,
            error_rate_warning: 0.1,
            stuck_multiplier: 2,
            event_buffer: 256,
        }
    }
}

/// On-disk/JSON shape; every field is optional and durations are milliseconds
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ConfigFile {
    max_concurrency: Option<usize>,
    response_time_threshold_ms: Option<u64>,
    memory_threshold: Option<f64>,
    sweep_interval_ms: Option<u64>,
    summary_interval_ms: Option<u64>,
    concurrency_warning_ratio: Option<f64>,
    error_rate_warning: Option<f64>,
    stuck_multiplier: Option<u32>,
    event_buffer: Option<usize>,
}

impl MonitorConfig {
    /// Age after which the janitor force-fails an operation
    pub fn stuck_threshold(&self) -> Duration {
        self.response_time_threshold * self.stuck_multiplier
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(MonitorError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        for (name, ratio) in [
            ("memory_threshold", self.memory_threshold),
            ("concurrency_warning_ratio", self.concurrency_warning_ratio),
            ("error_rate_warning", self.error_rate_warning),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(MonitorError::Config(format!(
                    "{} must be within (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        for (name, duration) in [
            ("response_time_threshold", self.response_time_threshold),
            ("sweep_interval", self.sweep_interval),
            ("summary_interval", self.summary_interval),
        ] {
            if duration.is_zero() {
                return Err(MonitorError::Config(format!("{} must be non-zero", name)));
            }
        }
        if self.stuck_multiplier == 0 {
            return Err(MonitorError::Config(
                "stuck_multiplier must be at least 1".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(MonitorError::Config(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a JSON document, filling absent fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)?;
        let mut config = Self::default();
        config.apply(file);
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by `SMM_MONITOR_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`MonitorConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let file = ConfigFile {
            max_concurrency: parse_var("MAX_CONCURRENCY", var("MAX_CONCURRENCY"))?,
            response_time_threshold_ms: parse_var(
                "RESPONSE_TIME_THRESHOLD_MS",
                var("RESPONSE_TIME_THRESHOLD_MS"),
            )?,
            memory_threshold: parse_var("MEMORY_THRESHOLD", var("MEMORY_THRESHOLD"))?,
            sweep_interval_ms: parse_var("SWEEP_INTERVAL_MS", var("SWEEP_INTERVAL_MS"))?,
            summary_interval_ms: parse_var("SUMMARY_INTERVAL_MS", var("SUMMARY_INTERVAL_MS"))?,
            concurrency_warning_ratio: parse_var(
                "CONCURRENCY_WARNING_RATIO",
                var("CONCURRENCY_WARNING_RATIO"),
            )?,
            error_rate_warning: parse_var("ERROR_RATE_WARNING", var("ERROR_RATE_WARNING"))?,
            stuck_multiplier: parse_var("STUCK_MULTIPLIER", var("STUCK_MULTIPLIER"))?,
            event_buffer: parse_var("EVENT_BUFFER", var("EVENT_BUFFER"))?,
        };

        let mut config = Self::default();
        config.apply(file);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(v) = file.max_concurrency {
            self.max_concurrency = v;
        }
        if let Some(ms) = file.response_time_threshold_ms {
            self.response_time_threshold = Duration::from_millis(ms);
        }
        if let Some(v) = file.memory_threshold {
            self.memory_threshold = v;
        }
        if let Some(ms) = file.sweep_interval_ms {
            self.sweep_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.summary_interval_ms {
            self.summary_interval = Duration::from_millis(ms);
        }
        if let Some(v) = file.concurrency_warning_ratio {
            self.concurrency_warning_ratio = v;
        }
        if let Some(v) = file.error_rate_warning {
            self.error_rate_warning = v;
        }
        if let Some(v) = file.stuck_multiplier {
            self.stuck_multiplier = v;
        }
        if let Some(v) = file.event_buffer {
            self.event_buffer = v;
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            MonitorError::Config(format!(
                "{}{} has unparseable value '{}'",
                ENV_PREFIX, name, value
            ))
        }),
    }
}
