//! MCBench reference host.
//!
//! Runs a fixed-rate tick loop on its own thread and feeds it console
//! commands from stdin. Ctrl-C aborts any running benchmark and exits.

use anyhow::{Context, Result};
use clap::Parser;
use mcb_common::config::BenchConfig;
use mcb_common::logging::{LogConfig, init_logging};
use mcbd::host::{HostEvent, MAX_TICK_RATE, TickLoop};
use mcbd::orchestrator::DEFAULT_TICKS_PER_SECOND;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "mcbd")]
#[command(author, version, about = "MCBench - stress-and-recovery benchmark host")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "MCB_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for daily-rolling JSON log files
    #[arg(long, env = "MCB_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Host tick rate (ticks per second)
    #[arg(
        long,
        default_value_t = DEFAULT_TICKS_PER_SECOND,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TICK_RATE)
    )]
    tick_rate: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON logs on stderr
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if cli.json {
        log_config = log_config.with_json();
    }
    if let Some(dir) = &cli.log_dir {
        log_config = log_config.with_log_dir(dir.clone());
    }
    let _guards = init_logging(&log_config)?;

    let config_path = cli.config.unwrap_or_else(BenchConfig::default_path);
    let config = BenchConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    info!(
        path = %config_path.display(),
        profiles = ?config.profile_names(),
        tick_rate = cli.tick_rate,
        "Starting MCBench host"
    );

    let (tx, rx) = mpsc::channel();
    let tick_rate = cli.tick_rate;
    // The orchestrator is not Send; build it on the thread that runs it.
    let mut host = tokio::task::spawn_blocking(move || -> Result<()> {
        TickLoop::new(config, config_path, tick_rate, rx)?.run();
        Ok(())
    });

    // A plain thread: a blocked stdin read must not hold up runtime shutdown.
    let stdin_tx = tx.clone();
    std::thread::Builder::new()
        .name("mcb-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if stdin_tx.send(HostEvent::Command(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read error: {}", e);
                        return;
                    }
                }
            }
            info!("stdin closed, console commands disabled");
        })
        .context("failed to start stdin reader")?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
            let _ = tx.send(HostEvent::Shutdown);
            host.await.context("host thread panicked")??;
        }
        joined = &mut host => {
            joined.context("host thread panicked")??;
        }
    }

    info!("MCBench host exited");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rate_is_range_checked() {
        let cli = Cli::try_parse_from(["mcbd"]).unwrap();
        assert_eq!(cli.tick_rate, DEFAULT_TICKS_PER_SECOND);
        assert_eq!(
            Cli::try_parse_from(["mcbd", "--tick-rate", "100"])
                .unwrap()
                .tick_rate,
            100
        );
        assert!(Cli::try_parse_from(["mcbd", "--tick-rate", "0"]).is_err());
        assert!(Cli::try_parse_from(["mcbd", "--tick-rate", "4294967296"]).is_err());
    }
}
