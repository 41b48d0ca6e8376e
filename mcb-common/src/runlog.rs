//! Append-only audit log of benchmark runs (`runs.log`).
//!
//! ```text
//! 2026-10-18T14:02:11+00:00 | profile=normal | safe=false | initiator=Console | result=ok
//! 2026-10-18T14:03:40+00:00 | action=save-all | status=executed
//! ```
//!
//! Write failures are logged and swallowed; the audit trail never affects a run.

use chrono::{DateTime, Local, SecondsFormat};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Terminal outcome recorded for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Ok,
    Aborted,
    Expired,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Aborted => write!(f, "aborted"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunLogger {
    path: PathBuf,
}

impl RunLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_run(
        &self,
        profile: &str,
        safe_mode: bool,
        initiator: &str,
        outcome: RunOutcome,
        reason: Option<&str>,
    ) {
        self.append(&format_run_line(
            Local::now(),
            profile,
            safe_mode,
            initiator,
            outcome,
            reason,
        ));
    }

    pub fn log_save_all(&self) {
        self.append(&format!(
            "{} | action=save-all | status=executed",
            timestamp(Local::now())
        ));
    }

    pub fn log_bypass(&self, profile: &str, initiator: &str, required_mb: u64, current_mb: u64) {
        self.append(&format!(
            "{} | action=bypass_used | profile={profile} | initiator={} | ram_required={required_mb} | ram_current={current_mb} | reason=RAM_requirements_bypassed",
            timestamp(Local::now()),
            initiator_name(initiator),
        ));
    }

    fn append(&self, line: &str) {
        if let Err(err) = self.try_append(line) {
            warn!(path = %self.path.display(), error = %err, "Failed to write run log entry");
        }
    }

    fn try_append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

fn timestamp(at: DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn initiator_name(initiator: &str) -> &str {
    if initiator.trim().is_empty() {
        "Console"
    } else {
        initiator
    }
}

/// `timestamp | profile=<p> | safe=<bool> | initiator=<name> | result=<r> [| reason=<why>]`
pub fn format_run_line(
    at: DateTime<Local>,
    profile: &str,
    safe_mode: bool,
    initiator: &str,
    outcome: RunOutcome,
    reason: Option<&str>,
) -> String {
    let mut line = format!(
        "{} | profile={profile} | safe={safe_mode} | initiator={} | result={outcome}",
        timestamp(at),
        initiator_name(initiator),
    );
    if let Some(reason) = reason.filter(|r| !r.is_empty()) {
        line.push_str(" | reason=");
        line.push_str(reason);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_line_format() {
        let at = Local.with_ymd_and_hms(2026, 10, 18, 14, 2, 11).unwrap();
        let line = format_run_line(at, "normal", true, "alex", RunOutcome::Aborted, Some("timeout"));
        let (ts, rest) = line.split_once(" | ").unwrap();
        assert!(ts.starts_with("2026-10-18T14:02:11"));
        assert_eq!(
            rest,
            "profile=normal | safe=true | initiator=alex | result=aborted | reason=timeout"
        );
    }

    #[test]
    fn blank_initiator_is_console_and_reason_optional() {
        let at = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let line = format_run_line(at, "minimum", false, "", RunOutcome::Ok, None);
        assert!(line.ends_with("| profile=minimum | safe=false | initiator=Console | result=ok"));
        let line = format_run_line(at, "minimum", false, "", RunOutcome::Expired, Some(""));
        assert!(line.ends_with("result=expired"));
    }

    #[test]
    fn appends_lines_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = RunLogger::new(dir.path().join("nested").join("runs.log"));
        logger.log_save_all();
        logger.log_run("normal", false, "Console", RunOutcome::Ok, None);
        logger.log_bypass("extreme", "ops", 4096, 2048);

        let content = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("| action=save-all | status=executed"));
        assert!(lines[1].contains("| result=ok"));
        assert!(lines[2].contains("action=bypass_used | profile=extreme | initiator=ops"));
        assert!(lines[2].ends_with("reason=RAM_requirements_bypassed"));
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for append.
        let logger = RunLogger::new(dir.path());
        logger.log_save_all();
    }
}
