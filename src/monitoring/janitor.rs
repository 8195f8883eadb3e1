use super::monitor::OperationMonitor;
use crate::error::Result;
use log::{debug, info};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Periodic sweep and summary loops for an [`OperationMonitor`].
///
/// Nothing runs until [`start`](BackgroundTasks::start); [`stop`](BackgroundTasks::stop)
/// aborts both loops and is safe to call repeatedly. Dropping the handle stops them too.
pub struct BackgroundTasks {
    sweep: Option<JoinHandle<()>>,
    summary: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Spawn the janitor and summary loops on the current tokio runtime.
    ///
    /// Fails without spawning anything if the monitor's configuration does not
    /// validate.
    pub fn start(monitor: Arc<OperationMonitor>) -> Result<Self> {
        monitor.config().validate()?;

        let sweep_interval = monitor.config().sweep_interval;
        let summary_interval = monitor.config().summary_interval;

        let sweep = tokio::spawn(run_every(sweep_interval, {
            let monitor = monitor.clone();
            move || {
                let removed = monitor.sweep_stuck_operations();
                debug!("Janitor sweep finished, {} removed", removed);
            }
        }));

        let summary = tokio::spawn(run_every(summary_interval, move || {
            info!("{}", monitor.summary_line());
        }));

        info!(
            "Background tasks started: sweep every {}s, summary every {}s",
            sweep_interval.as_secs(),
            summary_interval.as_secs()
        );

        Ok(Self {
            sweep: Some(sweep),
            summary: Some(summary),
        })
    }

    /// True only while both loops are alive
    pub fn is_running(&self) -> bool {
        self.is_sweeping() && self.is_summarizing()
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweep.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_summarizing(&self) -> bool {
        self.summary.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        let mut stopped = false;
        for handle in [self.sweep.take(), self.summary.take()].into_iter().flatten() {
            handle.abort();
            stopped = true;
        }
        if stopped {
            info!("Background tasks stopped");
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Call `tick` once per `period`, first after one full period has elapsed
async fn run_every<F>(period: Duration, mut tick: F)
where
    F: FnMut() + Send + 'static,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::error::MonitorError;
    use crate::monitoring::memory::FixedMemoryProbe;

    fn monitor_with(config: MonitorConfig) -> Arc<OperationMonitor> {
        Arc::new(OperationMonitor::with_memory_probe(
            config,
            Arc::new(FixedMemoryProbe::with_ratio(0.1)),
        ))
    }

    fn monitor() -> Arc<OperationMonitor> {
        monitor_with(MonitorConfig {
            response_time_threshold: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(60),
            ..MonitorConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_on_interval() {
        let monitor = monitor();
        let mut tasks = BackgroundTasks::start(monitor.clone()).unwrap();
        assert!(tasks.is_running());
        assert!(tasks.is_sweeping() && tasks.is_summarizing());

        monitor.try_admit("stuck", "bulk-order-sync", 100);

        // Not yet due
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(monitor.is_active("stuck"));

        // First tick at 60s, operation is 60s old (> 20s)
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!monitor.is_active("stuck"));
        assert_eq!(monitor.metrics().failed_operations, 1);

        tasks.stop();
        tasks.stop();
        assert!(!tasks.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_tasks_do_not_sweep() {
        let monitor = monitor();
        let mut tasks = BackgroundTasks::start(monitor.clone()).unwrap();
        tasks.stop();

        monitor.try_admit("stuck", "bulk-order-sync", 1);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(monitor.is_active("stuck"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sweep_interval_is_refused() {
        let monitor = monitor_with(MonitorConfig {
            sweep_interval: Duration::ZERO,
            ..MonitorConfig::default()
        });

        match BackgroundTasks::start(monitor.clone()) {
            Err(MonitorError::Config(msg)) => assert!(msg.contains("sweep_interval")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("background tasks started with a zero sweep interval"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_running_requires_both_loops() {
        let mut tasks = BackgroundTasks::start(monitor()).unwrap();
        if let Some(sweep) = tasks.sweep.take() {
            sweep.abort();
        }
        tokio::task::yield_now().await;

        assert!(!tasks.is_sweeping());
        assert!(tasks.is_summarizing());
        assert!(!tasks.is_running());
    }
}
