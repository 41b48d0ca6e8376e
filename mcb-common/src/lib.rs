//! Shared types, configuration and logging for MCBench.
//!
//! Everything that both the telemetry collectors and the orchestrator daemon
//! need lives here: the configuration model, the error taxonomy, immutable
//! metric and result values, the clock seam and the run log.

pub mod clock;
pub mod config;
pub mod errors;
pub mod logging;
pub mod runlog;
pub mod testing;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BenchConfig, ProfileSettings, ScoringSettings};
pub use errors::{ConfigError, ExportError, StateError};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use runlog::{RunLogger, RunOutcome};
pub use types::{
    AbortReason, BenchmarkProfile, BenchmarkResult, BenchmarkState, Grade, MetricSnapshot,
    ScoreResult, SystemInfo, WorldAnalysis, WorldStats,
};
