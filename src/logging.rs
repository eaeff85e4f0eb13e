//! Tracing setup for the `sonicvault` binary.
//!
//! The console only carries warnings by default so command output stays
//! readable; the per-run file under `<app root>/logs` records everything the
//! `RUST_LOG` filter lets through. Each file is named after the command that
//! produced it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};

const KEEP_RUN_LOGS: usize = 10;
const FILE_FILTER: &str = "sonicvault=debug,info";
const LOG_FILE_PREFIX: &str = "sonicvault_";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log directory unavailable: {0}")]
    Dir(#[from] AppDirError),
    #[error("Failed to prune logs in {path}: {source}")]
    Prune {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log file time: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// How chatty stderr is; the log file is unaffected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsoleLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl ConsoleLevel {
    fn filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::DEBUG,
        }
    }
}

/// Install the global subscriber for one CLI run of `command`.
///
/// Later calls are no-ops.
pub fn init(command: &str, console: ConsoleLevel) -> Result<(), LoggingError> {
    if FILE_GUARD.get().is_some() {
        return Ok(());
    }
    let dir = app_dirs::logs_dir()?;
    prune_run_logs(&dir, KEEP_RUN_LOGS.saturating_sub(1))?;
    let file_name = run_log_name(command, now_local_or_utc())?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &file_name));

    let timer = fmt::time::OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        format_description!("[hour]:[minute]:[second].[subsecond digits:3]"),
    );
    let console_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(console.filter());
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(file_writer)
        .with_filter(file_filter());
    tracing::subscriber::set_global_default(
        Registry::default().with(console_layer).with(file_layer),
    )?;
    let _ = FILE_GUARD.set(guard);
    tracing::debug!(command, file = %dir.join(&file_name).display(), "Run log opened");
    Ok(())
}

fn file_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FILE_FILTER))
}

fn run_log_name(command: &str, at: OffsetDateTime) -> Result<String, LoggingError> {
    const STAMP: &[FormatItem<'_>] =
        format_description!("[year][month][day]-[hour][minute][second]");
    let command: String = command
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect();
    Ok(format!("{LOG_FILE_PREFIX}{}_{command}.log", at.format(STAMP)?))
}

/// Keep the newest `keep` run logs. Names sort by their timestamp.
fn prune_run_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let prune_error = |source| LoggingError::Prune {
        path: dir.to_path_buf(),
        source,
    };
    let mut runs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(prune_error)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_run_log(path))
        .collect();
    runs.sort();
    let excess = runs.len().saturating_sub(keep);
    for path in &runs[..excess] {
        fs::remove_file(path).map_err(prune_error)?;
    }
    Ok(())
}

fn is_run_log(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log"))
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_log_is_named_after_time_and_command() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(
            run_log_name("upload", at).unwrap(),
            "sonicvault_20231114-221320_upload.log"
        );
        assert_eq!(
            run_log_name("a b/c", at).unwrap(),
            "sonicvault_20231114-221320_a-b-c.log"
        );
    }

    #[test]
    fn prune_keeps_newest_runs_and_foreign_files() {
        let dir = tempdir().unwrap();
        for stamp in ["20240101-000000", "20240102-000000", "20240103-000000"] {
            fs::write(dir.path().join(format!("sonicvault_{stamp}_list.log")), "").unwrap();
        }
        fs::write(dir.path().join("settings.toml"), "").unwrap();
        fs::write(dir.path().join("other.log"), "").unwrap();

        prune_run_logs(dir.path(), 1).unwrap();
        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "other.log",
                "settings.toml",
                "sonicvault_20240103-000000_list.log"
            ]
        );
    }

    #[test]
    fn console_levels_map_to_filters() {
        assert_eq!(ConsoleLevel::default().filter(), LevelFilter::WARN);
        assert_eq!(ConsoleLevel::Quiet.filter(), LevelFilter::ERROR);
        assert_eq!(ConsoleLevel::Verbose.filter(), LevelFilter::DEBUG);
    }
}
