use log::{error, info};
use smm_panel_monitor::{
    init_logging, server, BackgroundTasks, MonitorConfig, OperationMonitor,
};
use std::env;
use std::net::TcpListener;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = env::var("SMM_MONITOR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_file = env::var("SMM_MONITOR_LOG_FILE").ok();
    init_logging(&level, log_file.as_deref())?;

    let config = MonitorConfig::from_env()?;
    info!(
        "Starting operation monitor: max_concurrency={}, response_time_threshold={}ms, memory_threshold={:.2}",
        config.max_concurrency,
        config.response_time_threshold.as_millis(),
        config.memory_threshold
    );

    let monitor = Arc::new(OperationMonitor::new(config));
    let mut tasks = BackgroundTasks::start(monitor.clone())?;

    let addr = env::var("SMM_MONITOR_ADDR").unwrap_or_else(|_| "127.0.0.1:8090".to_string());
    let listener = TcpListener::bind(&addr)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    };

    let result = server::serve(monitor.clone(), listener, shutdown).await;
    tasks.stop();
    info!("{}", monitor.summary_line());

    result?;
    Ok(())
}
