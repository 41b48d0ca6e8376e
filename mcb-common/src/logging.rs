//! Process-wide tracing setup.
//!
//! Console output goes to stdout or stderr in pretty or JSON form; when a log
//! directory is configured a daily-rolling JSON file is written as well,
//! through a non-blocking writer whose guard lives in [`LoggingGuards`].

use crate::config::EnvParser;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

pub const LOG_FILE_PREFIX: &str = "mcbd.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub stderr: bool,
    pub log_dir: Option<PathBuf>,
}

impl LogConfig {
    /// Reads `MCB_LOG_LEVEL`, `MCB_LOG_FORMAT` and `MCB_LOG_DIR`.
    pub fn from_env(default_level: &str) -> Self {
        let mut env = EnvParser::new();
        let level = env.get_string("LOG_LEVEL", default_level);
        let format = match env.get_choice("LOG_FORMAT", "pretty", &["pretty", "json"]).as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let log_dir = env.get_path("LOG_DIR");
        for err in env.take_errors() {
            eprintln!("mcbench: {err}");
        }
        Self {
            level,
            format,
            stderr: false,
            log_dir,
        }
    }

    #[must_use]
    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// Keeps background log writers alive; drop at shutdown to flush.
#[derive(Default)]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid log filter '{}'", config.level))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match (config.format, config.stderr) {
        (LogFormat::Json, true) => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        (LogFormat::Json, false) => fmt::layer().json().with_writer(std::io::stdout).boxed(),
        (LogFormat::Pretty, true) => fmt::layer().with_target(false).with_writer(std::io::stderr).boxed(),
        (LogFormat::Pretty, false) => fmt::layer().with_target(false).with_writer(std::io::stdout).boxed(),
    });

    let mut guards = LoggingGuards::default();
    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guards._file = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;

    #[test]
    fn builder_overrides() {
        let config = LogConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            stderr: false,
            log_dir: None,
        }
        .with_stderr()
        .with_level("debug")
        .with_json()
        .with_log_dir("/tmp/mcb-logs");

        assert!(config.stderr);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/mcb-logs")));
    }

    #[test]
    fn from_env_defaults() {
        let _guard = env_test_lock();
        let config = LogConfig::from_env("warn");
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.stderr);
    }
}
