//! Logger initialization.
//!
//! Configures `env_logger` with either a colored human-readable format or a
//! single-line JSON format. `RUST_LOG` is read first and the explicit level
//! overrides it, so `RUST_LOG=debug` works for quick debugging while
//! `--log-level` stays authoritative.

use std::io::Write;

use anyhow::Context;
use colored::Colorize;
use log::LevelFilter;

use crate::config::LogFormat;

/// Initializes the global logger with the given level and format.
///
/// Uses `try_init()` so repeated calls (common in tests) fail with an error
/// instead of panicking.
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> anyhow::Result<()> {
    colored::control::set_override(true);

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    // Dependency chatter stays at info and below regardless of our level.
    builder.filter_module("html5ever", LevelFilter::Error);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("selectors", LevelFilter::Warn);
    builder.filter_module("seo_recovery", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
                    chrono::Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    serde_json::to_string(&record.args().to_string())
                        .unwrap_or_else(|_| "\"\"".into())
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let level = record.level();
                let colored_level = match level {
                    log::Level::Error => level.to_string().red(),
                    log::Level::Warn => level.to_string().yellow(),
                    log::Level::Info => level.to_string().green(),
                    log::Level::Debug => level.to_string().blue(),
                    log::Level::Trace => level.to_string().purple(),
                };
                writeln!(
                    buf,
                    "{} [{}] {}",
                    record.target().cyan(),
                    colored_level,
                    record.args()
                )
            });
        }
    }

    builder.try_init().context("Failed to initialize logger")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_does_not_panic() {
        // env_logger can only be installed once per process; later calls
        // return an error rather than panicking, and both outcomes are fine
        // here.
        let first = init_logger_with(LevelFilter::Info, LogFormat::Plain);
        let second = init_logger_with(LevelFilter::Debug, LogFormat::Json);
        assert!(first.is_ok() || first.is_err());
        assert!(second.is_err() || second.is_ok());
    }
}
