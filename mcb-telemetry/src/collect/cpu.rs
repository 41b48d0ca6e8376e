//! CPU load collection from /proc/stat and /proc/self/stat.
//!
//! Both system and process load are derived from jiffy deltas between two
//! reads, so the first reading after construction is always invalid (NaN).

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur during CPU metrics collection.
#[derive(Error, Debug)]
pub enum CpuError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {reason}")]
    Parse { what: &'static str, reason: String },
}

fn read_proc(path: &str) -> Result<String, CpuError> {
    std::fs::read_to_string(path).map_err(|source| CpuError::Read {
        path: PathBuf::from(path),
        source,
    })
}

/// Aggregate CPU time from /proc/stat, in jiffies since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStats {
    pub fn read_from_proc() -> Result<Self, CpuError> {
        Self::parse(&read_proc("/proc/stat")?)
    }

    /// Parse the aggregate `cpu ` line of /proc/stat.
    pub fn parse(content: &str) -> Result<Self, CpuError> {
        let line = content
            .lines()
            .find(|line| line.starts_with("cpu "))
            .ok_or_else(|| CpuError::Parse {
                what: "/proc/stat",
                reason: "no aggregate cpu line".to_string(),
            })?;

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            return Err(CpuError::Parse {
                what: "/proc/stat",
                reason: format!("expected at least 5 fields, got {}", parts.len()),
            });
        }
        let field = |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        Ok(Self {
            user: field(1),
            nice: field(2),
            system: field(3),
            idle: field(4),
            iowait: field(5),
            irq: field(6),
            softirq: field(7),
            steal: field(8),
        })
    }

    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn active(&self) -> u64 {
        self.total()
            .saturating_sub(self.idle)
            .saturating_sub(self.iowait)
    }

    /// Utilization between two samples, 0.0..=100.0. NaN if no time passed.
    pub fn calculate_percent(prev: &CpuStats, curr: &CpuStats) -> f64 {
        let total_delta = curr.total().saturating_sub(prev.total());
        let active_delta = curr.active().saturating_sub(prev.active());
        if total_delta == 0 {
            return f64::NAN;
        }
        (active_delta as f64 / total_delta as f64) * 100.0
    }
}

/// CPU time consumed by this process (utime + stime), in jiffies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessCpuTime {
    pub utime: u64,
    pub stime: u64,
}

impl ProcessCpuTime {
    pub fn read_self() -> Result<Self, CpuError> {
        Self::parse(&read_proc("/proc/self/stat")?)
    }

    /// Parse /proc/<pid>/stat. The command name may contain spaces and
    /// parentheses, so fields are counted from the last `)`.
    pub fn parse(content: &str) -> Result<Self, CpuError> {
        let rest = content
            .rfind(')')
            .map(|idx| &content[idx + 1..])
            .ok_or_else(|| CpuError::Parse {
                what: "/proc/self/stat",
                reason: "missing command terminator".to_string(),
            })?;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // fields[0] is field 3 (state); utime/stime are fields 14/15.
        let parse_at = |idx: usize, name: &str| -> Result<u64, CpuError> {
            fields
                .get(idx)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| CpuError::Parse {
                    what: "/proc/self/stat",
                    reason: format!("invalid {name}"),
                })
        };
        Ok(Self {
            utime: parse_at(11, "utime")?,
            stime: parse_at(12, "stime")?,
        })
    }

    pub fn total(&self) -> u64 {
        self.utime + self.stime
    }
}

/// One pair of load readings, in percent. NaN marks an unavailable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuReading {
    pub system_pct: f64,
    pub process_pct: f64,
}

impl CpuReading {
    pub const INVALID: Self = Self {
        system_pct: f64::NAN,
        process_pct: f64::NAN,
    };
}

/// Source of CPU readings polled by the background monitor.
pub trait CpuLoadSource: Send + 'static {
    fn sample(&mut self) -> CpuReading;
}

/// Delta-based reader over /proc. Process load is normalized across all
/// cores, matching how system load is reported.
#[derive(Debug, Default)]
pub struct ProcCpuLoad {
    prev_system: Option<CpuStats>,
    prev_process: Option<ProcessCpuTime>,
}

impl ProcCpuLoad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance with freshly read counters and compute the deltas.
    pub fn observe(
        &mut self,
        system: Option<CpuStats>,
        process: Option<ProcessCpuTime>,
    ) -> CpuReading {
        let mut reading = CpuReading::INVALID;
        if let (Some(prev), Some(curr)) = (self.prev_system, system) {
            reading.system_pct = CpuStats::calculate_percent(&prev, &curr);
            if let (Some(prev_proc), Some(curr_proc)) = (self.prev_process, process) {
                let total_delta = curr.total().saturating_sub(prev.total());
                if total_delta > 0 {
                    let proc_delta = curr_proc.total().saturating_sub(prev_proc.total());
                    reading.process_pct = (proc_delta as f64 / total_delta as f64 * 100.0).min(100.0);
                }
            }
        }
        self.prev_system = system;
        self.prev_process = process;
        reading
    }
}

impl CpuLoadSource for ProcCpuLoad {
    fn sample(&mut self) -> CpuReading {
        let system = CpuStats::read_from_proc()
            .map_err(|err| debug!(error = %err, "System CPU read failed"))
            .ok();
        let process = ProcessCpuTime::read_self()
            .map_err(|err| debug!(error = %err, "Process CPU read failed"))
            .ok();
        let reading = self.observe(system, process);
        trace!(
            system_pct = reading.system_pct,
            process_pct = reading.process_pct,
            "CPU sample"
        );
        reading
    }
}
