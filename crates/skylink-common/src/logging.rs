//! ---
//! sky_section: "01-core-functionality"
//! sky_subsection: "module"
//! sky_type: "source"
//! sky_scope: "code"
//! sky_description: "Shared primitives and utilities for the gateway runtime."
//! sky_version: "v0.1.0"
//! sky_owner: "tbd"
//! ---
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "SKYLINK_LOG";

/// Flush handles for the background writers; held for the process lifetime.
static WRITER_GUARDS: OnceCell<[WorkerGuard; 2]> = OnceCell::new();

/// Console output style for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structured-json" | "json" => Ok(Self::StructuredJson),
            "pretty" => Ok(Self::Pretty),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// `SKYLINK_LOG`, then `RUST_LOG`, then `fallback`.
fn env_filter(fallback: &str) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("ignoring {LOG_ENV}={directive:?}: {err}");
            EnvFilter::new(fallback)
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    }
}

fn daily_file(directory: &Path, prefix: &str) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("cannot create log directory {}", directory.display()))?;
    let appender = tracing_appender::rolling::daily(directory, format!("{prefix}.log"));
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the daemon subscriber: console output in `config.format` plus a
/// daily-rolling JSON file under `config.directory`.
///
/// The filter defaults to `info`; per-datagram events sit at `debug`.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let (file_writer, file_guard) = daily_file(&config.directory, prefix)?;
    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stdout());
    WRITER_GUARDS.set([file_guard, console_guard]).ok();

    let console = fmt::layer().with_timer(UtcTime::rfc_3339()).with_writer(console_writer);
    let console = match config.format {
        LogFormat::StructuredJson => console.with_target(false).json().boxed(),
        LogFormat::Pretty => console.boxed(),
    };
    let file = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer);

    // A second call keeps the subscriber installed first.
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(console)
        .with(file)
        .try_init()
        .ok();

    info!(
        service = service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        "logging ready"
    );
    Ok(())
}

/// Stderr-only subscriber for short-lived command line tools.
pub fn init_cli_tracing() {
    tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_aliases() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::StructuredJson));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
