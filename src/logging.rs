//! Logger setup for the `folio` binary.
//!
//! The library only talks to the `log` facade; this module installs
//! flexi_logger behind it. The level spec comes from `--log-level`, else
//! `FOLIO_LOG`, else `warn`, and accepts the usual module filters
//! (`info,folio::scan=debug`). Log lines go to stderr so command output on
//! stdout stays parseable.

use flexi_logger::{DeferredNow, Logger, LoggerHandle};
use log::Record;
use std::io::Write;

pub const DEFAULT_LEVEL: &str = "warn";

/// Start the global logger. The returned handle must be kept alive.
pub fn init(level: Option<&str>) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    Logger::try_with_str(level.unwrap_or(DEFAULT_LEVEL))?
        .format(line_format)
        .log_to_stderr()
        .start()
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

// "2024-01-03 10:15:00.123 INF rebuilt index: ... (folio/indexer.rs:42)"
fn line_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args(),
        target_as_path(record.target(), record.line())
    )
}

/// `folio::scan` at line 42 → `folio/scan.rs:42`.
fn target_as_path(target: &str, line: Option<u32>) -> String {
    let path = format!("{}.rs", target.replace("::", "/"));
    match line {
        Some(n) => format!("{path}:{n}"),
        None => path,
    }
}
