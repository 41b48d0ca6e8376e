//! Memory collection from /proc/meminfo and /proc/self/status.
//!
//! "Heap" here is the host process's resident set measured against a
//! ceiling: the configured memory limit, or physical memory when unset.

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}

fn read_proc(path: &str) -> Result<String, MemoryError> {
    std::fs::read_to_string(path).map_err(|source| MemoryError::Read {
        path: PathBuf::from(path),
        source,
    })
}

/// Parse `Key:   12345 kB` lines into a map of kB values.
fn parse_kb_table(content: &str) -> HashMap<&str, u64> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let kb = value.trim().trim_end_matches("kB").trim().parse().ok()?;
            Some((key.trim(), kb))
        })
        .collect()
}

/// System memory from /proc/meminfo, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    pub available_kb: u64,
}

impl MemoryInfo {
    pub fn read_from_proc() -> Result<Self, MemoryError> {
        Self::parse(&read_proc("/proc/meminfo")?)
    }

    pub fn parse(content: &str) -> Result<Self, MemoryError> {
        let map = parse_kb_table(content);
        let total_kb = *map.get("MemTotal").ok_or(MemoryError::MissingField("MemTotal"))?;
        let free_kb = *map.get("MemFree").ok_or(MemoryError::MissingField("MemFree"))?;
        // MemAvailable is missing on very old kernels.
        let available_kb = map.get("MemAvailable").copied().unwrap_or_else(|| {
            free_kb + map.get("Buffers").copied().unwrap_or(0) + map.get("Cached").copied().unwrap_or(0)
        });
        Ok(Self {
            total_kb,
            free_kb,
            available_kb,
        })
    }

    pub fn total_mb(&self) -> u64 {
        self.total_kb / 1024
    }
}

/// Resident set size of a process, from /proc/<pid>/status.
pub fn parse_rss_kb(status: &str) -> Result<u64, MemoryError> {
    parse_kb_table(status)
        .get("VmRSS")
        .copied()
        .ok_or(MemoryError::MissingField("VmRSS"))
}

/// Heap usage in MB as reported in snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapUsage {
    pub used_mb: u64,
    pub max_mb: u64,
}

impl HeapUsage {
    pub fn usage_pct(&self) -> f64 {
        if self.max_mb == 0 {
            return 0.0;
        }
        self.used_mb as f64 / self.max_mb as f64 * 100.0
    }
}

pub trait HeapSource: Send + Sync {
    fn heap(&self) -> HeapUsage;
}

/// Reads RSS and the memory ceiling from /proc on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcHeap {
    limit_mb: u64,
}

impl ProcHeap {
    /// `limit_mb == 0` means "use physical memory as the ceiling".
    pub fn new(limit_mb: u64) -> Self {
        Self { limit_mb }
    }

    pub fn max_mb(&self) -> u64 {
        if self.limit_mb > 0 {
            return self.limit_mb;
        }
        match MemoryInfo::read_from_proc() {
            Ok(info) => info.total_mb(),
            Err(err) => {
                debug!(error = %err, "Could not read physical memory");
                0
            }
        }
    }
}

impl HeapSource for ProcHeap {
    fn heap(&self) -> HeapUsage {
        let used_mb = read_proc("/proc/self/status")
            .and_then(|status| parse_rss_kb(&status))
            .map(|kb| kb / 1024)
            .unwrap_or_else(|err| {
                debug!(error = %err, "Could not read process RSS");
                0
            });
        HeapUsage {
            used_mb,
            max_mb: self.max_mb(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16384000 kB\n\
                           MemFree:         2048000 kB\n\
                           MemAvailable:    8192000 kB\n\
                           Buffers:          512000 kB\n";

    #[test]
    fn parses_meminfo() {
        let info = MemoryInfo::parse(MEMINFO).unwrap();
        assert_eq!(info.total_kb, 16_384_000);
        assert_eq!(info.available_kb, 8_192_000);
        assert_eq!(info.total_mb(), 16_000);
    }

    #[test]
    fn meminfo_available_fallback() {
        let info = MemoryInfo::parse("MemTotal: 1000 kB\nMemFree: 100 kB\nBuffers: 50 kB\nCached: 25 kB\n")
            .unwrap();
        assert_eq!(info.available_kb, 175);
    }

    #[test]
    fn meminfo_missing_total() {
        let err = MemoryInfo::parse("MemFree: 1 kB\n").unwrap_err();
        assert!(matches!(err, MemoryError::MissingField("MemTotal")));
    }

    #[test]
    fn parses_rss_from_status() {
        let status = "Name:\tjava\nVmPeak:\t 9000000 kB\nVmRSS:\t 2097152 kB\nThreads:\t42\n";
        assert_eq!(parse_rss_kb(status).unwrap(), 2_097_152);
        assert!(parse_rss_kb("Name:\tjava\n").is_err());
    }

    #[test]
    fn usage_percent() {
        let heap = HeapUsage {
            used_mb: 512,
            max_mb: 2048,
        };
        assert_eq!(heap.usage_pct(), 25.0);
        assert_eq!(HeapUsage { used_mb: 1, max_mb: 0 }.usage_pct(), 0.0);
    }

    #[test]
    fn configured_limit_wins() {
        assert_eq!(ProcHeap::new(4096).max_mb(), 4096);
    }
}
