// ============================================================================
// nightmode-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: fern dispatch for console and file output
//
// The core only talks to the `log` facade. This module installs the backend:
// a compact console format on stderr and, when a log directory is given, a
// full-detail file `nightmode_<YYYYMMDD_HHMMSS>.log`.
//
// USAGE:
// - default: Info and above
// - --verbose: Debug and above, which includes every external command line

use crate::error::{CliErrorContext, CliResult};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Name of the log file created for a run started at `timestamp`.
pub fn log_file_name(timestamp: &str) -> String {
    format!("nightmode_{timestamp}.log")
}

/// Installs the global logger. Returns the path of the log file, if any.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> CliResult<Option<PathBuf>> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {:<5} {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = fern::Dispatch::new()
        .level(level)
        .level_for("ffmpeg_sidecar", LevelFilter::Warn)
        .chain(console);

    let mut log_path = None;
    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)
            .cli_with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let path = dir.join(log_file_name(&get_timestamp()));
        let file = fern::log_file(&path)
            .cli_with_context(|| format!("Failed to open log file {}", path.display()))?;

        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "[{} {} {}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
        log_path = Some(path);
    }

    dispatch
        .apply()
        .map_err(|e| nightmode_core::CoreError::Config(format!("logger already set: {e}")))?;
    log::debug!("Logger initialized with level: {}", level);
    Ok(log_path)
}
