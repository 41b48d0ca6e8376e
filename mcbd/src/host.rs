//! Host seams and the reference tick-loop host.
//!
//! The orchestrator only sees the host through [`HostHooks`],
//! [`WorldIntrospector`] and [`TickStatsSource`]. The reference host is a
//! plain fixed-rate loop on a dedicated thread: it drains console commands,
//! advances the orchestrator one tick, and measures its own tick timing.

use crate::commands::CommandDispatcher;
use crate::orchestrator::{BenchmarkOrchestrator, Collaborators, Timing};
use crate::recommend::ThresholdRecommender;
use crate::report::{ConsoleReport, JsonFileExporter, ResultExporter};
use crate::workload::MixedWork;
use anyhow::{Context, Result, ensure};
use mcb_common::clock::SystemClock;
use mcb_common::config::{BenchConfig, SafeModeSettings};
use mcb_common::runlog::RunLogger;
use mcb_common::types::{AbortReason, WorldAnalysis, WorldStats};
use mcb_telemetry::collect::cpu::ProcCpuLoad;
use mcb_telemetry::collect::memory::ProcHeap;
use mcb_telemetry::sampler::{MAX_TPS, SAMPLE_INTERVAL};
use mcb_telemetry::{CpuMonitor, MetricSampler, ProcSystemProbe, TickStatsSource};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Side effects the orchestrator asks of the host.
pub trait HostHooks {
    fn broadcast(&mut self, message: &str);
    /// Flush persistent state before load starts.
    fn save_all(&mut self) -> Result<()>;
    /// Safe mode: clear the host of clients and transient objects.
    fn evacuate(&mut self, safe_mode: &SafeModeSettings) -> Result<()>;
}

pub trait WorldIntrospector {
    fn analyze(&self) -> WorldAnalysis;
}

// ── Reference collaborators ─────────────────────────────────────────────

/// Console-only host: broadcasts go to stdout, nothing to save or evacuate.
#[derive(Debug, Default)]
pub struct ConsoleHooks;

impl HostHooks for ConsoleHooks {
    fn broadcast(&mut self, message: &str) {
        println!("[MCBench] {message}");
        debug!(message, "Broadcast");
    }

    fn save_all(&mut self) -> Result<()> {
        debug!("Reference host has no persistent world state to flush");
        Ok(())
    }

    fn evacuate(&mut self, safe_mode: &SafeModeSettings) -> Result<()> {
        info!(
            kick_message = %safe_mode.kick_message,
            clear_dropped_items = safe_mode.clear_dropped_items,
            "Safe mode requested, reference host has no clients to disconnect"
        );
        Ok(())
    }
}

/// Fixed world list. The reference host reports none.
#[derive(Debug, Clone, Default)]
pub struct StaticWorlds {
    worlds: Vec<WorldStats>,
}

impl StaticWorlds {
    pub fn new(worlds: Vec<WorldStats>) -> Self {
        Self { worlds }
    }
}

impl WorldIntrospector for StaticWorlds {
    fn analyze(&self) -> WorldAnalysis {
        WorldAnalysis {
            worlds: self.worlds.clone(),
        }
    }
}

// ── Tick stats ──────────────────────────────────────────────────────────

const MSPT_WINDOW: usize = 20;
const TPS_WINDOW: Duration = Duration::from_secs(1);

/// Latest measured tick rate and tick cost, published as f64 bits.
#[derive(Debug)]
pub struct HostTickStats {
    tps_bits: AtomicU64,
    mspt_bits: AtomicU64,
}

impl Default for HostTickStats {
    fn default() -> Self {
        Self {
            tps_bits: AtomicU64::new(MAX_TPS.to_bits()),
            mspt_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }
}

impl TickStatsSource for HostTickStats {
    fn tps(&self) -> f64 {
        f64::from_bits(self.tps_bits.load(Ordering::Acquire))
    }

    fn mspt(&self) -> f64 {
        f64::from_bits(self.mspt_bits.load(Ordering::Acquire))
    }
}

/// Feeds [`HostTickStats`] from the tick loop.
///
/// MSPT is the mean cost of the last 20 ticks. TPS is the number of ticks
/// started within the last second, capped at 20; it reads 20 until one
/// full second has been observed.
#[derive(Debug)]
pub struct TickRecorder {
    stats: Arc<HostTickStats>,
    durations: VecDeque<f64>,
    starts: VecDeque<Instant>,
    first_start: Option<Instant>,
}

impl TickRecorder {
    pub fn new(stats: Arc<HostTickStats>) -> Self {
        Self {
            stats,
            durations: VecDeque::with_capacity(MSPT_WINDOW),
            starts: VecDeque::new(),
            first_start: None,
        }
    }

    pub fn record(&mut self, start: Instant, cost: Duration) {
        if self.durations.len() == MSPT_WINDOW {
            self.durations.pop_front();
        }
        self.durations.push_back(cost.as_secs_f64() * 1000.0);
        let mspt = self.durations.iter().sum::<f64>() / self.durations.len() as f64;

        let first = *self.first_start.get_or_insert(start);
        self.starts.push_back(start);
        while let Some(front) = self.starts.front() {
            if start.saturating_duration_since(*front) >= TPS_WINDOW {
                self.starts.pop_front();
            } else {
                break;
            }
        }
        let tps = if start.saturating_duration_since(first) < TPS_WINDOW {
            MAX_TPS
        } else {
            (self.starts.len() as f64).min(MAX_TPS)
        };

        self.stats.mspt_bits.store(mspt.to_bits(), Ordering::Release);
        self.stats.tps_bits.store(tps.to_bits(), Ordering::Release);
    }
}

// ── Tick loop ───────────────────────────────────────────────────────────

/// Highest tick rate the reference host accepts.
pub const MAX_TICK_RATE: u64 = 1000;

/// One tick's share of a second at `ticks_per_second`.
pub fn tick_period(ticks_per_second: u64) -> Result<Duration> {
    ensure!(
        (1..=MAX_TICK_RATE).contains(&ticks_per_second),
        "tick rate {ticks_per_second} outside 1..={MAX_TICK_RATE}"
    );
    let per_second = u32::try_from(ticks_per_second).context("tick rate does not fit in u32")?;
    Ok(Duration::from_secs(1) / per_second)
}

/// Input delivered to the host thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Command(String),
    Shutdown,
}

/// Build the production collaborators for a reference host.
pub fn reference_collaborators(
    config: &BenchConfig,
    stats: Arc<HostTickStats>,
) -> Result<Collaborators> {
    let cpu = CpuMonitor::spawn(ProcCpuLoad::new(), SAMPLE_INTERVAL)
        .context("failed to start CPU monitor thread")?;
    let metrics = MetricSampler::new(stats, Box::new(ProcHeap::new(config.host.memory_limit_mb)), cpu);
    let exporter: Option<Box<dyn ResultExporter>> =
        Some(Box::new(JsonFileExporter::new(&config.settings.export.directory)));
    Ok(Collaborators {
        metrics: Box::new(metrics),
        hooks: Box::new(ConsoleHooks),
        world: Box::new(StaticWorlds::default()),
        system: Box::new(ProcSystemProbe),
        recommender: Box::new(ThresholdRecommender::new(
            config.recommendations.thresholds.clone(),
        )),
        reporter: Box::new(ConsoleReport),
        exporter,
        run_log: RunLogger::new(&config.host.run_log),
        work: Box::new(MixedWork::for_profile),
    })
}

/// Fixed-rate host loop. Overrunning ticks start the next one immediately
/// rather than catching up.
pub struct TickLoop {
    orchestrator: BenchmarkOrchestrator,
    dispatcher: CommandDispatcher,
    recorder: TickRecorder,
    period: Duration,
    events: Receiver<HostEvent>,
}

impl TickLoop {
    pub fn new(
        config: BenchConfig,
        config_path: PathBuf,
        ticks_per_second: u64,
        events: Receiver<HostEvent>,
    ) -> Result<Self> {
        let period = tick_period(ticks_per_second)?;
        let timing = Timing::for_tick_rate(ticks_per_second);
        let stats = Arc::new(HostTickStats::default());
        let collab = reference_collaborators(&config, Arc::clone(&stats))?;
        let orchestrator =
            BenchmarkOrchestrator::new(Arc::new(config), collab, Arc::new(SystemClock), timing);
        Ok(Self {
            orchestrator,
            dispatcher: CommandDispatcher::new(config_path),
            recorder: TickRecorder::new(stats),
            period,
            events,
        })
    }

    /// Run until a shutdown event arrives or every sender is gone.
    pub fn run(mut self) {
        info!(period_ms = self.period.as_millis() as u64, "Host tick loop running");
        let mut deadline = Instant::now();
        loop {
            let start = Instant::now();
            if !self.drain_events() {
                break;
            }
            self.orchestrator.tick();
            let end = Instant::now();
            self.recorder.record(start, end - start);

            deadline += self.period;
            if deadline > end {
                std::thread::sleep(deadline - end);
            } else {
                deadline = end;
            }
        }
        if self.orchestrator.force_stop(AbortReason::Stopped) {
            warn!("Benchmark aborted by host shutdown");
        }
        info!("Host tick loop stopped");
    }

    /// Returns false once the loop should exit.
    fn drain_events(&mut self) -> bool {
        loop {
            match self.events.try_recv() {
                Ok(HostEvent::Command(line)) => {
                    if let Some(reply) = self.dispatcher.handle_line(&mut self.orchestrator, &line) {
                        println!("{reply}");
                    }
                }
                Ok(HostEvent::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }
}
