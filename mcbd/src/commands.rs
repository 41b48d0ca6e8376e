//! Console command surface.
//!
//! ```text
//! start <profile> [safe] [--bypass]   open a confirmation window
//! confirm | cancel                    answer the pending request
//! stop                                abort a run or drop a pending request
//! check                               metrics, system info, RAM verdicts
//! reload                              re-read the config file
//! help
//! ```

use crate::confirmation::StartRequest;
use crate::orchestrator::{BenchTask, BenchmarkOrchestrator};
use crate::scheduler::Scheduler;
use mcb_common::config::BenchConfig;
use mcb_common::errors::{ConfigError, StateError};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const CONSOLE_INITIATOR: &str = "Console";
const START_USAGE: &str = "start <profile> [safe] [--bypass]";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(
        "profile '{profile}' needs {required_mb} MB of RAM but only {current_mb} MB is available; add --bypass to run anyway"
    )]
    InsufficientRam {
        profile: String,
        current_mb: u64,
        required_mb: u64,
    },

    #[error("usage: {0}")]
    Usage(String),

    #[error("unknown command '{0}', type 'help' for the list")]
    UnknownCommand(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        profile: String,
        safe_mode: bool,
        bypass: bool,
    },
    Confirm,
    Cancel,
    Stop,
    Check,
    Reload,
    Help,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Usage("help".to_string()));
        };
        let verb = verb.to_ascii_lowercase();
        let cmd = match verb.as_str() {
            "start" => {
                let profile = words
                    .next()
                    .ok_or_else(|| CommandError::Usage(START_USAGE.to_string()))?
                    .to_string();
                let mut safe_mode = false;
                let mut bypass = false;
                for flag in words.by_ref() {
                    match flag.to_ascii_lowercase().as_str() {
                        "safe" => safe_mode = true,
                        "--bypass" => bypass = true,
                        _ => return Err(CommandError::Usage(START_USAGE.to_string())),
                    }
                }
                return Ok(Self::Start {
                    profile,
                    safe_mode,
                    bypass,
                });
            }
            "confirm" => Self::Confirm,
            "cancel" => Self::Cancel,
            "stop" => Self::Stop,
            "check" => Self::Check,
            "reload" => Self::Reload,
            "help" | "?" => Self::Help,
            _ => return Err(CommandError::UnknownCommand(verb)),
        };
        if words.next().is_some() {
            return Err(CommandError::Usage(verb));
        }
        Ok(cmd)
    }
}

/// `2.0 GB` from 1024 MB up, `512 MB` below.
pub fn format_ram(mb: u64) -> String {
    if mb >= 1024 {
        format!("{:.1} GB", mb as f64 / 1024.0)
    } else {
        format!("{mb} MB")
    }
}

/// Runs console commands against an orchestrator and renders replies.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    config_path: PathBuf,
    initiator: String,
}

impl CommandDispatcher {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            initiator: CONSOLE_INITIATOR.to_string(),
        }
    }

    /// Parse and execute one line. Errors come back as reply text.
    pub fn handle_line<S: Scheduler<BenchTask>>(
        &self,
        orchestrator: &mut BenchmarkOrchestrator<S>,
        line: &str,
    ) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        let reply = line
            .parse::<Command>()
            .and_then(|cmd| self.execute(orchestrator, cmd));
        Some(match reply {
            Ok(text) => text,
            Err(err) => {
                warn!(command = line.trim(), error = %err, "Command rejected");
                format!("Error: {err}")
            }
        })
    }

    pub fn execute<S: Scheduler<BenchTask>>(
        &self,
        orchestrator: &mut BenchmarkOrchestrator<S>,
        command: Command,
    ) -> Result<String, CommandError> {
        match command {
            Command::Start {
                profile,
                safe_mode,
                bypass,
            } => self.start(orchestrator, &profile, safe_mode, bypass),
            Command::Confirm => {
                orchestrator.confirm()?;
                Ok("Benchmark confirmed.".to_string())
            }
            Command::Cancel => {
                orchestrator.cancel()?;
                Ok("Benchmark request cancelled.".to_string())
            }
            Command::Stop => {
                orchestrator.stop()?;
                Ok("Benchmark stopped.".to_string())
            }
            Command::Check => Ok(check_report(orchestrator)),
            Command::Reload => self.reload(orchestrator),
            Command::Help => Ok(help_text()),
        }
    }

    fn start<S: Scheduler<BenchTask>>(
        &self,
        orchestrator: &mut BenchmarkOrchestrator<S>,
        name: &str,
        safe_mode: bool,
        bypass: bool,
    ) -> Result<String, CommandError> {
        let config = Arc::clone(orchestrator.config());
        let profile = config.profile(name)?;
        let required_mb = config.minimum_ram_mb(name);
        let current_mb = orchestrator.max_memory_mb();
        if !bypass && current_mb < required_mb {
            return Err(CommandError::InsufficientRam {
                profile: name.to_string(),
                current_mb,
                required_mb,
            });
        }

        orchestrator.request_start(StartRequest {
            profile,
            safe_mode,
            initiator: self.initiator.clone(),
        })?;
        if bypass {
            warn!(profile = name, required_mb, current_mb, "RAM check bypassed");
            orchestrator
                .run_log()
                .log_bypass(name, &self.initiator, required_mb, current_mb);
        }
        let mode = if safe_mode { " in safe mode" } else { "" };
        Ok(format!(
            "Benchmark '{name}'{mode} is waiting for confirmation ({}s).",
            config.settings.confirmation_seconds
        ))
    }

    fn reload<S: Scheduler<BenchTask>>(
        &self,
        orchestrator: &mut BenchmarkOrchestrator<S>,
    ) -> Result<String, CommandError> {
        let config = BenchConfig::load_or_default(&self.config_path)?;
        let profiles = config.profile_names().len();
        orchestrator.set_config(Arc::new(config));
        info!(path = %self.config_path.display(), profiles, "Configuration reloaded");
        let mut reply = format!("Configuration reloaded ({profiles} profiles).");
        if !orchestrator.state().is_idle() {
            reply.push_str(" The running benchmark keeps its current settings.");
        }
        Ok(reply)
    }
}

fn check_report<S: Scheduler<BenchTask>>(orchestrator: &BenchmarkOrchestrator<S>) -> String {
    let snap = orchestrator.snapshot();
    let info = orchestrator.system_info();
    let config = orchestrator.config();
    let mut out = String::new();

    let _ = writeln!(out, "State:   {}", orchestrator.state());
    if let Some(remaining) = orchestrator.remaining_confirmation() {
        let _ = writeln!(out, "Pending: {remaining}s left to confirm");
    }
    if let Some(progress) = orchestrator.progress() {
        let _ = writeln!(
            out,
            "Load:    {}/{}s ({:.1}%)",
            progress.elapsed_seconds, progress.total_seconds, progress.percent
        );
    }
    let _ = writeln!(
        out,
        "Metrics: TPS {:.2} | MSPT {:.2} | CPU {:.2}% (process {:.2}%) | RAM {:.2}%",
        snap.tps, snap.mspt, snap.system_cpu_pct, snap.process_cpu_pct, snap.memory_usage_pct
    );
    let _ = writeln!(
        out,
        "System:  {} {} {} | {} x{} | {}",
        info.os_name,
        info.os_version,
        info.arch,
        info.cpu_model,
        info.cpu_cores,
        format_ram(info.total_memory_mb)
    );
    let available = snap.max_memory_mb;
    let _ = writeln!(out, "RAM:     {} available", format_ram(available));
    for name in config.profile_names() {
        let required = config.minimum_ram_mb(&name);
        let verdict = if available >= required { "ok" } else { "insufficient" };
        let _ = writeln!(out, "  {name:<10} needs {:<8} {verdict}", format_ram(required));
    }
    let _ = write!(out, "Worlds:  {}", orchestrator.world_analysis().summary());
    out
}

fn help_text() -> String {
    [
        "start <profile> [safe] [--bypass]  request a benchmark run",
        "confirm                            confirm the pending request",
        "cancel                             cancel the pending request",
        "stop                               abort the running benchmark",
        "check                              show metrics and RAM verdicts",
        "reload                             reload the configuration file",
        "help                               show this list",
    ]
    .join("\n")
}
