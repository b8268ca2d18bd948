use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";
const LOG_FILE: &str = "engine.log";

/// Keeps the non-blocking writer alive; drop it last to flush.
pub struct LoggingHandle {
    pub guard: WorkerGuard,
}

/// Install the global subscriber. Stdout carries the protocol, so logs go
/// to `<log_dir>/engine.log`, or to stderr when `to_stderr` is set.
pub fn init_logging(log_dir: &Path, to_stderr: bool) -> anyhow::Result<LoggingHandle> {
    let filter = std::env::var("PHOTOBRIDGE_LOG_FILTER")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let (writer, guard) = if to_stderr {
        tracing_appender::non_blocking(std::io::stderr())
    } else {
        std::fs::create_dir_all(log_dir)?;
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE))
    };
    let format = std::env::var("PHOTOBRIDGE_LOG_FORMAT").unwrap_or_else(|_| "json".into());

    let registry = tracing_subscriber::registry().with(filter);
    if format.eq_ignore_ascii_case("pretty") {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()?;
    }

    let destination = if to_stderr {
        "stderr".to_string()
    } else {
        log_dir.join(LOG_FILE).display().to_string()
    };
    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        destination = %destination,
        format = %format,
        filter = %std::env::var("PHOTOBRIDGE_LOG_FILTER")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
    );

    Ok(LoggingHandle { guard })
}
