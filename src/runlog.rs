//! Persistent failure log
//!
//! Every failed conversion is appended to a plain text log (by default
//! `run.log` in the working directory), in addition to the tracing output.

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::Local;
use tracing::warn;

/// Default log file name, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = "run.log";

const SEPARATOR: &str = "============================================================";

/// Append-only log of job failures
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_FILE)
    }
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a failure report
    ///
    /// Write errors are only reported through tracing; they never replace
    /// the failure being logged.
    pub fn append_failure(&self, error: &(dyn StdError + 'static), output: Option<&Path>) {
        let entry = format_entry(error, output, &Backtrace::force_capture());

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(e) = written {
            warn!(log = %self.path.display(), error = %e, "failed to write run log");
        }
    }
}

fn format_entry(error: &(dyn StdError + 'static), output: Option<&Path>, backtrace: &Backtrace) -> String {
    let mut entry = String::new();

    let _ = writeln!(entry, "{}", SEPARATOR);
    let _ = writeln!(entry, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %z"));
    let _ = writeln!(entry, "Error occurred: {}", error);
    if let Some(output) = output {
        let _ = writeln!(entry, "Output path: {}", output.display());
    }

    let mut source = error.source();
    while let Some(cause) = source {
        let _ = writeln!(entry, "Caused by: {}", cause);
        source = cause.source();
    }

    let _ = writeln!(entry, "Backtrace:\n{}", backtrace);
    let _ = writeln!(entry, "{}\n", SEPARATOR);

    entry
}
