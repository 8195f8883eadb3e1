use crate::error::{MonitorError, Result};
use log::LevelFilter;
use std::str::FromStr;

/// Install the global logger.
///
/// Lines go to stdout and, when `file` is given, are appended to that file too.
/// Calling this twice returns an error from the `log` facade.
pub fn init_logging(level: &str, file: Option<&str>) -> Result<()> {
    let level = LevelFilter::from_str(level)
        .map_err(|_| MonitorError::Logging(format!("unknown log level '{}'", level)))?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
