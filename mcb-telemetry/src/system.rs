//! Static host description: OS, architecture, CPU model, memory.

use crate::collect::memory::MemoryInfo;
use mcb_common::types::SystemInfo;
use tracing::debug;

pub trait SystemProbe {
    fn system_info(&self) -> SystemInfo;
}

/// Reads /proc/cpuinfo, /etc/os-release and /proc/meminfo.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcSystemProbe;

impl SystemProbe for ProcSystemProbe {
    fn system_info(&self) -> SystemInfo {
        let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").unwrap_or_default();
        let os_release = std::fs::read_to_string("/etc/os-release").unwrap_or_default();
        let (os_name, os_version) = parse_os_release(&os_release);
        let total_memory_mb = MemoryInfo::read_from_proc()
            .map(|info| info.total_mb())
            .unwrap_or_else(|err| {
                debug!(error = %err, "Physical memory unavailable");
                0
            });

        SystemInfo {
            os_name: os_name.unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: os_version.unwrap_or_default(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_model: parse_cpu_model(&cpuinfo).unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: std::thread::available_parallelism().map_or(1, |n| n.get()),
            total_memory_mb,
        }
    }
}

/// First `model name` entry of /proc/cpuinfo (`Hardware` on some ARM boards).
pub fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim();
        (key == "model name" || key == "Hardware")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// `(NAME, VERSION_ID)` from os-release, quotes stripped.
pub fn parse_os_release(content: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut version = None;
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "NAME" => name = Some(value),
            "VERSION_ID" => version = Some(value),
            _ => {}
        }
    }
    (name, version)
}
