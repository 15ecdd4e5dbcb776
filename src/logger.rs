//! Logging setup for the sparse-nls binaries, benches and examples.
//!
//! The library itself only emits `tracing` events: the per-iteration table and the
//! configuration dump at `DEBUG`, plateau messages at `INFO`, errors through
//! `Error::log()`. This module installs a subscriber that prints them.

use std::fmt;

use chrono::Local;
use tracing::Level;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::registry::LookupSpan;

/// Initialize the tracing subscriber at `INFO`.
///
/// Format: `[LEVEL YYYY-MM-DD HH:MM:SS module] message`, with `file:line` in place of the
/// module for `DEBUG` and `TRACE` events.
///
/// Returns `false` if a global subscriber was already installed.
///
/// ```no_run
/// sparse_nls::init_logger();
/// tracing::info!("Application started");
/// ```
///
/// The level can be overridden through `RUST_LOG`:
/// ```bash
/// RUST_LOG=sparse_nls=debug cargo run --bin fit_curve
/// ```
pub fn init_logger() -> bool {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level (overridable via `RUST_LOG`).
///
/// ```no_run
/// use tracing::Level;
///
/// sparse_nls::init_logger_with_level(Level::DEBUG);
/// tracing::debug!("iteration table enabled");
/// ```
pub fn init_logger_with_level(default_level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .event_format(BracketFormatter)
        .try_init()
        .is_ok()
}

/// ANSI-colored label for a level.
fn level_label(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31mERROR\x1b[0m",
        Level::WARN => "\x1b[33mWARN\x1b[0m",
        Level::INFO => "\x1b[32mINFO\x1b[0m",
        Level::DEBUG => "\x1b[34mDEBUG\x1b[0m",
        Level::TRACE => "\x1b[35mTRACE\x1b[0m",
    }
}

/// Last path component of a source file.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

struct BracketFormatter;

impl<S, N> FormatEvent<S, N> for BracketFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();

        write!(
            writer,
            "[{} {} ",
            level_label(level),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        match (level, metadata.file()) {
            (Level::DEBUG | Level::TRACE, Some(file)) => {
                write!(writer, "{}", file_name(file))?;
                if let Some(line) = metadata.line() {
                    write!(writer, ":{}", line)?;
                }
            }
            _ => write!(writer, "{}", metadata.target())?,
        }

        write!(writer, "] ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(file_name("src/optimizer/gauss_newton.rs"), "gauss_newton.rs");
        assert_eq!(file_name("C:\\crate\\src\\lib.rs"), "lib.rs");
        assert_eq!(file_name("lib.rs"), "lib.rs");
    }

    #[test]
    fn test_level_labels_are_distinct() {
        let labels = [
            Level::ERROR,
            Level::WARN,
            Level::INFO,
            Level::DEBUG,
            Level::TRACE,
        ]
        .map(level_label);
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_second_initialization_is_reported() {
        init_logger_with_level(Level::WARN);
        assert!(!init_logger());
    }
}
