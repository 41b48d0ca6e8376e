//! Presenting and persisting finished results.

use chrono::{DateTime, Utc};
use mcb_common::errors::ExportError;
use mcb_common::types::{BenchmarkResult, MetricSnapshot};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Receives every finished or aborted result.
pub trait ReportSink {
    fn present(&mut self, result: &BenchmarkResult);
}

/// Writes a result somewhere durable. Failures never affect the session.
pub trait ResultExporter {
    fn export(&self, result: &BenchmarkResult) -> Result<PathBuf, ExportError>;
}

// ── Console ─────────────────────────────────────────────────────────────

/// Prints the report block to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReport;

impl ReportSink for ConsoleReport {
    fn present(&mut self, result: &BenchmarkResult) {
        println!("{}", render(result));
    }
}

fn metric_lines(out: &mut String, label: &str, snap: &MetricSnapshot) {
    let _ = writeln!(
        out,
        "  {label:<11} TPS {:>6.2} | MSPT {:>8.2} ms | CPU {:>6.2}% | RAM {:>6.2}% ({}/{} MB)",
        snap.tps,
        snap.mspt,
        snap.system_cpu_pct,
        snap.memory_usage_pct,
        snap.used_memory_mb,
        snap.max_memory_mb
    );
}

/// Human-readable report block.
pub fn render(result: &BenchmarkResult) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "MCBench result: {} ({} mode)", result.profile, result.mode());
    let _ = writeln!(out, "{rule}");
    if let Some(reason) = result.abort_reason {
        let _ = writeln!(out, "Status:      ABORTED ({reason})");
    } else {
        let _ = writeln!(out, "Status:      completed");
    }
    let _ = writeln!(out, "Initiator:   {}", result.initiator);
    let _ = writeln!(out, "Workload:    {:.2}s", result.workload_seconds);
    if let Some(recovery) = result.recovery_seconds {
        let _ = writeln!(out, "Recovery:    {recovery:.2}s");
    }
    if let Some(baseline) = &result.baseline {
        metric_lines(&mut out, "Baseline", baseline);
    }
    if let Some(after) = &result.after_load {
        metric_lines(&mut out, "After load", after);
    }
    if let Some(score) = &result.score {
        let _ = writeln!(out, "Score:       {} (grade {})", score.final_score, score.grade);
        let _ = writeln!(out, "             {}", score.formula());
    }
    if let Some(point) = result.benchmark_point {
        let _ = writeln!(out, "Point:       {point:.6}");
    }
    let info = &result.system_info;
    let _ = writeln!(
        out,
        "System:      {} {} ({}) | {} x{} | {} MB",
        info.os_name, info.os_version, info.arch, info.cpu_model, info.cpu_cores, info.total_memory_mb
    );
    let _ = writeln!(out, "Worlds:      {}", result.analysis.summary());
    if !result.recommendations.is_empty() {
        let _ = writeln!(out, "Recommendations:");
        for rec in &result.recommendations {
            let _ = writeln!(out, "  - {rec}");
        }
    }
    let _ = write!(out, "{rule}");
    out
}

// ── JSON file ───────────────────────────────────────────────────────────

/// Writes `<directory>/benchmark_<profile>_<timestamp>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileExporter {
    directory: PathBuf,
}

impl JsonFileExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_name(profile: &str, at: DateTime<Utc>) -> String {
        let profile: String = profile
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("benchmark_{profile}_{}.json", at.format("%Y-%m-%d_%H-%M-%S"))
    }
}

impl ResultExporter for JsonFileExporter {
    fn export(&self, result: &BenchmarkResult) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.directory).map_err(|source| ExportError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let path = self
            .directory
            .join(Self::file_name(&result.profile, result.timestamp));
        let body = serde_json::to_string_pretty(result)?;
        fs::write(&path, body).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
