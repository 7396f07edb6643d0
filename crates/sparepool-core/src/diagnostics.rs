//! Timestamped diagnostics sink
//!
//! Every log line goes to a single writer (stderr in production) prefixed
//! with a second-granularity local timestamp such as
//! `[19/Oct/2026:14:03:59]`. OS error descriptions travel inside the error
//! values and are rendered by their `Display`.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::log_error;
use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Timer rendering `[DD/Mon/YYYY:HH:MM:SS]` in local time
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimestamp;

impl FormatTime for LogTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", format_timestamp(&Local::now()))
    }
}

/// Render a timestamp in diagnostics format
pub fn format_timestamp<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    time.format("[%d/%b/%Y:%H:%M:%S]").to_string()
}

/// Build the diagnostics subscriber around any writer
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn subscriber<W>(level: &str, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    filtered_subscriber(filter, writer)
}

fn filtered_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LogTimestamp)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .finish()
}

/// Install the process-wide subscriber writing to stderr
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    tracing::subscriber::set_global_default(subscriber(&config.level, std::io::stderr))
        .map_err(|e| Error::config(format!("Failed to install logger: {}", e)))
}

/// Report a fatal error and terminate the process with status 1
pub fn fatal(err: &dyn fmt::Display) -> ! {
    log_error!("{}", err);
    std::process::exit(1)
}
