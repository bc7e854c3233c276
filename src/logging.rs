//! Tracing setup: a compact stdout layer plus, when a log directory is given,
//! daily-rotated text and JSON files written off the hot path.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the background file writers alive. Drop it only at process exit or
/// buffered lines are lost.
#[must_use = "dropping the guards stops file logging"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` controls filtering (default `info`), e.g.
/// `RUST_LOG=rust_pricewatch=debug,reqwest=warn`.
///
/// With `log_dir` set, also writes:
/// 1. `<log_dir>/pricewatch.log` - plain text
/// 2. `<log_dir>/pricewatch.json.log` - one JSON object per event
pub fn init_logging(log_dir: Option<&Path>) -> Result<LogGuards, Box<dyn std::error::Error>> {
    let env_filter = || EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"));

    let Some(log_path) = log_dir else {
        tracing_subscriber::registry().with(stdout_layer(env_filter()?)).try_init()?;
        return Ok(LogGuards { _guards: Vec::new() });
    };

    std::fs::create_dir_all(log_path)?;

    let text_file_appender = tracing_appender::rolling::daily(log_path, "pricewatch.log");
    let (text_writer, text_guard) = tracing_appender::non_blocking(text_file_appender);

    let json_file_appender = tracing_appender::rolling::daily(log_path, "pricewatch.json.log");
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_file_appender);

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter()?);

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_filter(env_filter()?);

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(stdout_layer(env_filter()?))
        .try_init()?;

    tracing::debug!("File logs in {}", log_path.display());

    Ok(LogGuards {
        _guards: vec![text_guard, json_guard],
    })
}

/// Compact console output, built fresh for each subscriber stack.
fn stdout_layer<S>(filter: EnvFilter) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .compact()
        .with_filter(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Only one test may install the global subscriber.
    #[test]
    fn test_logging_creates_log_dir() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs");

        let guards = init_logging(Some(&log_path)).unwrap();
        tracing::info!("hello");
        assert!(log_path.exists());
        drop(guards);

        assert!(init_logging(None).is_err());
    }
}
