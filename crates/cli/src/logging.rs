//! Logging setup
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: `guestctl=info`)
//! - `GUESTCTL_LOG_FORMAT`: `compact` (default), `pretty` or `json`
//! - `GUESTCTL_LOG_DIR`: also write daily-rotated plain logs to this directory
//!
//! Console logs go to stderr so command output on stdout stays pipeable.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FORMAT_ENV: &str = "GUESTCTL_LOG_FORMAT";
const LOG_DIR_ENV: &str = "GUESTCTL_LOG_DIR";
const DEFAULT_FILTER: &str = "guestctl=info";
const LOG_FILE_PREFIX: &str = "guestctl.log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// whole run.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "compact".to_string());

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        "json" => {
            // Machine-readable structured logging
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        "pretty" => {
            registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(guard)
}
