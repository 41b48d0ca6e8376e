//! Core value types for benchmark sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Profile ─────────────────────────────────────────────────────────────

/// Immutable workload parameters, resolved from config at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkProfile {
    pub name: String,
    pub duration_seconds: u64,
    pub intensity_multiplier: f64,
    /// Host ticks between workload invocations.
    pub tick_interval: u64,
    pub loop_count_per_tick: u64,
    pub emergency_mspt_threshold: f64,
}

impl BenchmarkProfile {
    /// Loop budget for one workload invocation after scaling by intensity.
    pub fn adjusted_loop_count(&self) -> u64 {
        (self.loop_count_per_tick as f64 * self.intensity_multiplier) as u64
    }
}

// ── Metrics ─────────────────────────────────────────────────────────────

/// Point-in-time view of host health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub tps: f64,
    pub mspt: f64,
    pub system_cpu_pct: f64,
    pub process_cpu_pct: f64,
    pub memory_usage_pct: f64,
    pub used_memory_mb: u64,
    pub max_memory_mb: u64,
    pub timestamp: DateTime<Utc>,
}

// ── State ───────────────────────────────────────────────────────────────

/// Session phase. Confirmation-pending is tracked separately and only
/// exists while the orchestrator is `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkState {
    #[default]
    Idle,
    Preparing,
    Workload,
    Recovery,
    Reporting,
}

impl BenchmarkState {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

impl fmt::Display for BenchmarkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Preparing => write!(f, "preparing"),
            Self::Workload => write!(f, "workload"),
            Self::Recovery => write!(f, "recovery"),
            Self::Reporting => write!(f, "reporting"),
        }
    }
}

/// Why a session ended before reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// MSPT stayed above the profile threshold for the emergency window.
    Emergency,
    /// Global deadline elapsed.
    Timeout,
    /// The workload faulted.
    Error,
    /// Operator issued `stop` (or the host is shutting down).
    Stopped,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emergency => write!(f, "emergency"),
            Self::Timeout => write!(f, "timeout"),
            Self::Error => write!(f, "error"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ── Scoring ─────────────────────────────────────────────────────────────

/// Letter grade derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    F,
    D,
    C,
    #[serde(rename = "C+")]
    CPlus,
    B,
    #[serde(rename = "B+")]
    BPlus,
    A,
    #[serde(rename = "A+")]
    APlus,
    S,
}

impl Grade {
    const TABLE: [(i64, Grade); 8] = [
        (3000, Grade::S),
        (2500, Grade::APlus),
        (2000, Grade::A),
        (1500, Grade::BPlus),
        (1000, Grade::B),
        (500, Grade::CPlus),
        (200, Grade::C),
        (50, Grade::D),
    ];

    pub fn for_score(score: i64) -> Self {
        Self::TABLE
            .iter()
            .find(|(min, _)| score >= *min)
            .map_or(Grade::F, |(_, grade)| *grade)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::S => "S",
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(s)
    }
}

/// Score breakdown, including the raw inputs so the formula can be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub base_points: i64,
    pub time_penalty: i64,
    pub ram_bonus: i64,
    pub final_score: i64,
    pub grade: Grade,
    pub recovery_seconds: f64,
    pub penalty_per_second: f64,
    pub max_heap_mb: u64,
}

impl ScoreResult {
    pub fn formula(&self) -> String {
        format!(
            "{} - floor({:.2}s x {}) + floor({}MB x 1.75) = {} - {} + {} = {}",
            self.base_points,
            self.recovery_seconds,
            self.penalty_per_second,
            self.max_heap_mb,
            self.base_points,
            self.time_penalty,
            self.ram_bonus,
            self.final_score
        )
    }
}

// ── Host descriptions ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os_name: String,
    pub os_version: String,
    pub arch: String,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub total_memory_mb: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldStats {
    pub name: String,
    pub loaded_chunks: u64,
    pub entities: u64,
}

/// Immutable world summary supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldAnalysis {
    pub worlds: Vec<WorldStats>,
}

impl WorldAnalysis {
    pub fn total_chunks(&self) -> u64 {
        self.worlds.iter().map(|w| w.loaded_chunks).sum()
    }

    pub fn total_entities(&self) -> u64 {
        self.worlds.iter().map(|w| w.entities).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} world(s), {} chunks, {} entities",
            self.worlds.len(),
            self.total_chunks(),
            self.total_entities()
        )
    }
}

// ── Result ──────────────────────────────────────────────────────────────

/// Everything handed to reporting and export once a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub profile: String,
    pub safe_mode: bool,
    pub initiator: String,
    pub workload_seconds: f64,
    pub recovery_seconds: Option<f64>,
    pub score: Option<ScoreResult>,
    pub benchmark_point: Option<f64>,
    pub baseline: Option<MetricSnapshot>,
    pub after_load: Option<MetricSnapshot>,
    pub system_info: SystemInfo,
    pub analysis: WorldAnalysis,
    pub recommendations: Vec<String>,
    pub aborted: bool,
    pub abort_reason: Option<AbortReason>,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    pub fn mode(&self) -> &'static str {
        if self.safe_mode { "safe" } else { "normal" }
    }
}
