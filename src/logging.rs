//! File-backed logging for the dashboard
//!
//! The terminal is owned by the presenter, so log records go to an
//! append-only text file instead of stderr.

use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

/// Open (or create) the log file for appending
pub fn open_log_sink<P: AsRef<Path>>(path: P) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install `env_logger` writing to `path`, filtered by `RUST_LOG` or `default_filter`
pub fn init_file_logger(path: &str, default_filter: &str) -> io::Result<()> {
    let sink = open_log_sink(path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(Box::new(sink)))
        .write_style(env_logger::WriteStyle::Never)
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

/// Flush buffered records; called on the quit path before exit
pub fn flush() {
    log::logger().flush();
}
