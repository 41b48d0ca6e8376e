//! Benchmark session state machine.
//!
//! ```text
//!            confirm + grace            workload done         recovered
//!  IDLE ───────────────────▶ PREPARING ──▶ WORKLOAD ──────────▶ RECOVERY ──────▶ REPORTING ──▶ IDLE
//!   ▲                                         │                    │
//!   └──────────── force_stop (emergency | timeout | error | stopped) ┘
//! ```
//!
//! Everything here runs on the host's tick thread. Periodic work is
//! registered with the [`Scheduler`] and dispatched back through
//! [`BenchmarkOrchestrator::tick`]; every abort path goes through
//! [`BenchmarkOrchestrator::force_stop`], which is idempotent.

use crate::confirmation::{ConfirmationGate, CountdownStep, StartRequest};
use crate::host::{HostHooks, WorldIntrospector};
use crate::recommend::Recommender;
use crate::report::{ReportSink, ResultExporter};
use crate::scheduler::{Scheduler, TaskHandle, TickScheduler};
use crate::scoring;
use crate::workload::{TickOutcome, WorkFactory, WorkloadGenerator};
use chrono::Utc;
use mcb_common::clock::Clock;
use mcb_common::config::{BenchConfig, SafeModeSettings, ScoringSettings};
use mcb_common::errors::StateError;
use mcb_common::runlog::{RunLogger, RunOutcome};
use mcb_common::types::{
    AbortReason, BenchmarkResult, BenchmarkState, MetricSnapshot, SystemInfo, WorldAnalysis,
};
use mcb_telemetry::{MetricSource, SystemProbe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const DEFAULT_TICKS_PER_SECOND: u64 = 20;

// ── Tasks ───────────────────────────────────────────────────────────────

/// Everything the orchestrator schedules on the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchTask {
    ConfirmationCountdown,
    StartSession,
    WorkloadTick,
    ProgressLog,
    EmergencyCheck,
    GlobalTimeout,
    RecoveryPoll,
}

/// Monitor cadences, in host ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub ticks_per_second: u64,
    pub countdown_unit_ticks: u64,
    pub progress_ticks: u64,
    pub emergency_ticks: u64,
    pub recovery_ticks: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self::for_tick_rate(DEFAULT_TICKS_PER_SECOND)
    }
}

impl Timing {
    pub fn for_tick_rate(ticks_per_second: u64) -> Self {
        let tps = ticks_per_second.max(1);
        Self {
            ticks_per_second: tps,
            countdown_unit_ticks: tps,
            progress_ticks: tps * 2,
            emergency_ticks: tps,
            recovery_ticks: tps,
        }
    }

    pub fn seconds(&self, secs: u64) -> u64 {
        secs.saturating_mul(self.ticks_per_second)
    }
}

// ── Collaborators ───────────────────────────────────────────────────────

/// External services the orchestrator calls into. Owned for the lifetime
/// of the orchestrator.
pub struct Collaborators {
    pub metrics: Box<dyn MetricSource>,
    pub hooks: Box<dyn HostHooks>,
    pub world: Box<dyn WorldIntrospector>,
    pub system: Box<dyn SystemProbe>,
    pub recommender: Box<dyn Recommender>,
    pub reporter: Box<dyn ReportSink>,
    pub exporter: Option<Box<dyn ResultExporter>>,
    pub run_log: RunLogger,
    /// Work body for each session's workload generator.
    pub work: WorkFactory,
}

// ── Session ─────────────────────────────────────────────────────────────

/// Config values frozen when a session starts.
#[derive(Debug, Clone)]
struct SessionSettings {
    global_timeout_seconds: u64,
    emergency_duration: Duration,
    target_tps: f64,
    target_mspt: f64,
    point_divisor: f64,
    scoring: ScoringSettings,
    export_enabled: bool,
    safe_mode: SafeModeSettings,
}

impl SessionSettings {
    fn from_config(config: &BenchConfig, profile: &str) -> Self {
        Self {
            global_timeout_seconds: config.settings.global_timeout_seconds,
            emergency_duration: Duration::from_secs(config.settings.emergency.duration_seconds),
            target_tps: config.benchmark_point.target_tps,
            target_mspt: config.benchmark_point.target_mspt,
            point_divisor: config.benchmark_point.divisor,
            scoring: config.scoring_for(profile),
            export_enabled: config.settings.export.enabled,
            safe_mode: config.settings.safe_mode.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct SessionTasks {
    workload: Option<TaskHandle>,
    progress: Option<TaskHandle>,
    emergency: Option<TaskHandle>,
    timeout: Option<TaskHandle>,
    recovery: Option<TaskHandle>,
}

impl SessionTasks {
    fn cancel_all<S: Scheduler<BenchTask>>(&mut self, scheduler: &mut S) {
        for handle in [
            self.workload.take(),
            self.progress.take(),
            self.emergency.take(),
            self.timeout.take(),
            self.recovery.take(),
        ]
        .into_iter()
        .flatten()
        {
            scheduler.cancel(handle);
        }
    }
}

struct BenchmarkSession {
    request: StartRequest,
    settings: SessionSettings,
    baseline: Option<MetricSnapshot>,
    after_load: Option<MetricSnapshot>,
    workload: Option<WorkloadGenerator>,
    workload_started_at: Option<Instant>,
    workload_ended_at: Option<Instant>,
    recovery_started_at: Option<Instant>,
    emergency_since: Option<Instant>,
    emergency_samples: u32,
    progress_bucket: u64,
    tasks: SessionTasks,
}

impl BenchmarkSession {
    fn new(request: StartRequest, settings: SessionSettings) -> Self {
        Self {
            request,
            settings,
            baseline: None,
            after_load: None,
            workload: None,
            workload_started_at: None,
            workload_ended_at: None,
            recovery_started_at: None,
            emergency_since: None,
            emergency_samples: 0,
            progress_bucket: 0,
            tasks: SessionTasks::default(),
        }
    }

    fn workload_seconds(&self, now: Instant) -> f64 {
        match self.workload_started_at {
            Some(start) => self
                .workload_ended_at
                .unwrap_or(now)
                .saturating_duration_since(start)
                .as_secs_f64(),
            None => 0.0,
        }
    }
}

/// Live workload progress for status displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadProgress {
    pub elapsed_seconds: u64,
    pub total_seconds: u64,
    pub percent: f64,
}

// ── Orchestrator ────────────────────────────────────────────────────────

pub struct BenchmarkOrchestrator<S: Scheduler<BenchTask> = TickScheduler<BenchTask>> {
    config: Arc<BenchConfig>,
    timing: Timing,
    clock: Arc<dyn Clock>,
    scheduler: S,
    gate: ConfirmationGate,
    state: BenchmarkState,
    session: Option<BenchmarkSession>,
    collab: Collaborators,
    last_result: Option<BenchmarkResult>,
}

impl BenchmarkOrchestrator<TickScheduler<BenchTask>> {
    pub fn new(
        config: Arc<BenchConfig>,
        collab: Collaborators,
        clock: Arc<dyn Clock>,
        timing: Timing,
    ) -> Self {
        Self::with_scheduler(config, collab, clock, timing, TickScheduler::new())
    }
}

impl<S: Scheduler<BenchTask>> BenchmarkOrchestrator<S> {
    pub fn with_scheduler(
        config: Arc<BenchConfig>,
        collab: Collaborators,
        clock: Arc<dyn Clock>,
        timing: Timing,
        scheduler: S,
    ) -> Self {
        let gate = ConfirmationGate::new(
            config.settings.confirmation_seconds,
            timing.countdown_unit_ticks,
            timing.seconds(config.settings.grace_delay_seconds),
        );
        Self {
            config,
            timing,
            clock,
            scheduler,
            gate,
            state: BenchmarkState::Idle,
            session: None,
            collab,
            last_result: None,
        }
    }

    // ── Accessors ──

    pub fn state(&self) -> BenchmarkState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.gate.is_pending()
    }

    pub fn is_armed(&self) -> bool {
        self.gate.is_armed()
    }

    /// Anything in flight: a session, a pending confirmation or an armed start.
    pub fn is_busy(&self) -> bool {
        !self.state.is_idle() || self.gate.is_pending() || self.gate.is_armed()
    }

    pub fn config(&self) -> &Arc<BenchConfig> {
        &self.config
    }

    /// Swap in a reloaded config. A running session keeps the values it
    /// started with.
    pub fn set_config(&mut self, config: Arc<BenchConfig>) {
        self.gate.reconfigure(
            config.settings.confirmation_seconds,
            self.timing.countdown_unit_ticks,
            self.timing.seconds(config.settings.grace_delay_seconds),
        );
        self.config = config;
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn last_result(&self) -> Option<&BenchmarkResult> {
        self.last_result.as_ref()
    }

    pub fn remaining_confirmation(&self) -> Option<u32> {
        self.gate.remaining()
    }

    pub fn progress(&self) -> Option<WorkloadProgress> {
        let workload = self.session.as_ref()?.workload.as_ref()?;
        Some(WorkloadProgress {
            elapsed_seconds: workload.elapsed_seconds(),
            total_seconds: workload.total_seconds(),
            percent: workload.completion_pct(),
        })
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        self.collab.metrics.snapshot()
    }

    pub fn max_memory_mb(&self) -> u64 {
        self.collab.metrics.max_memory_mb()
    }

    pub fn system_info(&self) -> SystemInfo {
        self.collab.system.system_info()
    }

    pub fn world_analysis(&self) -> WorldAnalysis {
        self.collab.world.analyze()
    }

    pub fn run_log(&self) -> &RunLogger {
        &self.collab.run_log
    }

    /// Countdown, start and monitor tasks still registered with the scheduler.
    pub fn scheduled_tasks(&self) -> usize {
        self.scheduler.active_count()
    }

    pub fn broadcast(&mut self, message: &str) {
        self.collab.hooks.broadcast(message);
    }

    // ── Commands ──

    /// Open the confirmation window for `request`.
    pub fn request_start(&mut self, request: StartRequest) -> Result<(), StateError> {
        let profile = request.profile.name.clone();
        let window = self.gate.window();
        self.gate
            .request(&mut self.scheduler, request, !self.state.is_idle())?;
        self.collab.hooks.broadcast(&format!(
            "Benchmark '{profile}' requested. Type 'confirm' within {window}s to start or 'cancel' to abort."
        ));
        self.broadcast_status();
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), StateError> {
        if !self.gate.confirm(&mut self.scheduler) {
            return Err(StateError::NothingPending);
        }
        let grace = self.config.settings.grace_delay_seconds;
        self.collab
            .hooks
            .broadcast(&format!("Benchmark confirmed. Starting in {grace}s."));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), StateError> {
        if !self.gate.cancel(&mut self.scheduler) {
            return Err(StateError::NothingPending);
        }
        self.collab.hooks.broadcast("Benchmark request cancelled.");
        Ok(())
    }

    /// Operator stop: drops a pending/armed request, or aborts a session.
    pub fn stop(&mut self) -> Result<(), StateError> {
        if !self.state.is_idle() {
            self.force_stop(AbortReason::Stopped);
            return Ok(());
        }
        if self.gate.clear(&mut self.scheduler) {
            info!("Pending benchmark request dropped by stop");
            self.collab.hooks.broadcast("Benchmark request stopped.");
            return Ok(());
        }
        Err(StateError::NotRunning)
    }

    /// End the active session immediately. No-op (returns false) when idle.
    ///
    /// Cancels every scheduled task, produces an aborted result when a
    /// baseline was captured, and returns to `Idle`.
    pub fn force_stop(&mut self, reason: AbortReason) -> bool {
        if self.state.is_idle() {
            debug!(%reason, "force_stop ignored, no active session");
            return false;
        }
        let from = self.state;
        match reason {
            AbortReason::Stopped => warn!(state = %from, %reason, "Benchmark stopped"),
            _ => error!(state = %from, %reason, "Benchmark aborted"),
        }

        self.gate.clear(&mut self.scheduler);
        let now = self.clock.now();
        if let Some(mut session) = self.session.take() {
            session.tasks.cancel_all(&mut self.scheduler);
            if let Some(workload) = session.workload.as_mut() {
                workload.stop();
            }
            if session.workload_ended_at.is_none() && session.workload_started_at.is_some() {
                session.workload_ended_at = Some(now);
            }
            let request = &session.request;
            self.collab.run_log.log_run(
                &request.profile.name,
                request.safe_mode,
                &request.initiator,
                RunOutcome::Aborted,
                Some(&reason.to_string()),
            );
            self.collab
                .hooks
                .broadcast(&format!("Benchmark aborted ({reason})."));
            // Aborted runs are shown, never exported.
            if session.baseline.is_some() {
                let result = self.assemble_result(&session, now, Some(reason));
                self.deliver(result, false);
            }
        }
        self.state = BenchmarkState::Idle;
        info!(from = %from, "Returned to idle");
        true
    }

    // ── Tick dispatch ──

    /// Run everything due on the next host tick.
    pub fn tick(&mut self) {
        for handle in self.scheduler.advance() {
            if let Some(task) = self.scheduler.fire(handle) {
                self.dispatch(task);
            }
        }
    }

    fn dispatch(&mut self, task: BenchTask) {
        match task {
            BenchTask::ConfirmationCountdown => self.on_countdown(),
            BenchTask::StartSession => self.on_start_session(),
            BenchTask::WorkloadTick => self.on_workload_tick(),
            BenchTask::ProgressLog => self.on_progress(),
            BenchTask::EmergencyCheck => self.on_emergency_check(),
            BenchTask::GlobalTimeout => {
                let secs = self
                    .session
                    .as_ref()
                    .map_or(0, |s| s.settings.global_timeout_seconds);
                error!(timeout_secs = secs, "Global timeout reached");
                self.force_stop(AbortReason::Timeout);
            }
            BenchTask::RecoveryPoll => self.on_recovery_poll(),
        }
    }

    fn transition(&mut self, to: BenchmarkState) {
        let profile = self
            .session
            .as_ref()
            .map(|s| s.request.profile.name.as_str())
            .unwrap_or("-");
        info!(from = %self.state, to = %to, profile, "Benchmark state change");
        self.state = to;
    }

    fn on_countdown(&mut self) {
        match self.gate.on_countdown(&mut self.scheduler) {
            Some(CountdownStep::Waiting {
                remaining,
                announce: true,
            }) => {
                self.collab
                    .hooks
                    .broadcast(&format!("Benchmark awaiting confirmation: {remaining}s left."));
                self.broadcast_status();
            }
            Some(CountdownStep::Waiting { .. }) | None => {}
            Some(CountdownStep::Expired(request)) => {
                self.collab
                    .hooks
                    .broadcast("Benchmark request expired without confirmation.");
                self.collab.run_log.log_run(
                    &request.profile.name,
                    request.safe_mode,
                    &request.initiator,
                    RunOutcome::Expired,
                    None,
                );
            }
        }
    }

    fn broadcast_status(&mut self) {
        let snap = self.collab.metrics.snapshot();
        let info = self.collab.system.system_info();
        self.collab.hooks.broadcast(&format!(
            "Status: TPS {:.2} | MSPT {:.2} | RAM {}/{} MB ({:.1}%) | CPU {:.1}% | OS {} {} | {} x{}",
            snap.tps,
            snap.mspt,
            snap.used_memory_mb,
            snap.max_memory_mb,
            snap.memory_usage_pct,
            snap.system_cpu_pct,
            info.os_name,
            info.os_version,
            info.cpu_model,
            info.cpu_cores
        ));
    }

    // IDLE -> PREPARING -> WORKLOAD
    fn on_start_session(&mut self) {
        let Some(request) = self.gate.take_armed() else {
            return;
        };
        if !self.state.is_idle() {
            warn!(state = %self.state, "Armed start fired while a session is active, ignoring");
            return;
        }
        let settings = SessionSettings::from_config(&self.config, &request.profile.name);
        let safe_mode = request.safe_mode;
        self.session = Some(BenchmarkSession::new(request, settings));
        self.transition(BenchmarkState::Preparing);

        match self.collab.hooks.save_all() {
            Ok(()) => self.collab.run_log.log_save_all(),
            Err(err) => warn!(error = %err, "Pre-benchmark save failed, continuing"),
        }

        let baseline = self.collab.metrics.snapshot();
        info!(
            tps = baseline.tps,
            mspt = baseline.mspt,
            cpu = baseline.system_cpu_pct,
            used_mb = baseline.used_memory_mb,
            "Baseline captured"
        );
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.baseline = Some(baseline);

        if safe_mode {
            info!("Safe mode: evacuating host before load");
            if let Err(err) = self.collab.hooks.evacuate(&session.settings.safe_mode) {
                warn!(error = %err, "Safe mode evacuation failed, continuing");
            }
        }

        self.start_workload();
    }

    fn start_workload(&mut self) {
        let timing = self.timing;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let profile = session.request.profile.clone();
        let interval = profile.tick_interval;
        let work = (self.collab.work)(&profile);
        session.workload = Some(WorkloadGenerator::with_work(
            profile,
            Arc::clone(&self.clock),
            work,
        ));
        session.workload_started_at = Some(self.clock.now());

        // Registration order: the workload tick runs before monitors due the same tick.
        let timeout_ticks = timing.seconds(session.settings.global_timeout_seconds);
        session.tasks.workload = Some(self.scheduler.every(0, interval, BenchTask::WorkloadTick));
        session.tasks.progress = Some(self.scheduler.every(
            timing.progress_ticks,
            timing.progress_ticks,
            BenchTask::ProgressLog,
        ));
        session.tasks.emergency = Some(self.scheduler.every(
            timing.emergency_ticks,
            timing.emergency_ticks,
            BenchTask::EmergencyCheck,
        ));
        session.tasks.timeout = Some(self.scheduler.after(timeout_ticks, BenchTask::GlobalTimeout));

        let name = session.request.profile.name.clone();
        self.transition(BenchmarkState::Workload);
        self.collab
            .hooks
            .broadcast(&format!("Benchmark '{name}' started. Expect lag."));
    }

    fn on_workload_tick(&mut self) {
        if self.state != BenchmarkState::Workload {
            return;
        }
        let Some(workload) = self.session.as_mut().and_then(|s| s.workload.as_mut()) else {
            return;
        };
        match workload.tick() {
            TickOutcome::Continuing => {}
            TickOutcome::Completed => self.on_workload_completed(),
            TickOutcome::Faulted(message) => {
                error!(error = %message, "Workload faulted");
                self.force_stop(AbortReason::Error);
            }
        }
    }

    // WORKLOAD -> RECOVERY
    fn on_workload_completed(&mut self) {
        let now = self.clock.now();
        let after_load = self.collab.metrics.snapshot();
        let timing = self.timing;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        info!(
            tps = after_load.tps,
            mspt = after_load.mspt,
            workload_secs = session.workload_seconds(now),
            "Workload completed, measuring recovery"
        );
        session.workload_ended_at = Some(now);
        session.after_load = Some(after_load);
        for handle in [session.tasks.workload.take(), session.tasks.progress.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(handle);
        }
        session.recovery_started_at = Some(now);
        session.tasks.recovery = Some(self.scheduler.every(
            timing.recovery_ticks,
            timing.recovery_ticks,
            BenchTask::RecoveryPoll,
        ));
        self.transition(BenchmarkState::Recovery);
    }

    fn on_progress(&mut self) {
        if self.state != BenchmarkState::Workload {
            return;
        }
        let snap = self.collab.metrics.snapshot();
        info!(
            tps = snap.tps,
            mspt = snap.mspt,
            ram_pct = snap.memory_usage_pct,
            cpu_pct = snap.system_cpu_pct,
            "Benchmark under load"
        );
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(workload) = session.workload.as_ref() else {
            return;
        };
        let elapsed = workload.elapsed_seconds();
        let bucket = elapsed / 10;
        if bucket > session.progress_bucket {
            session.progress_bucket = bucket;
            let message = format!(
                "Benchmark progress: {elapsed}/{}s ({:.1}%) | TPS {:.2}",
                workload.total_seconds(),
                workload.completion_pct(),
                snap.tps
            );
            info!(elapsed, total = workload.total_seconds(), "{message}");
            self.collab.hooks.broadcast(&message);
        }
    }

    fn on_emergency_check(&mut self) {
        if self.state.is_idle() {
            return;
        }
        let mspt = self.collab.metrics.mspt();
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let threshold = session.request.profile.emergency_mspt_threshold;
        if mspt <= threshold {
            if session.emergency_since.take().is_some() {
                debug!(mspt, threshold, "MSPT back under threshold, emergency timer reset");
            }
            session.emergency_samples = 0;
            return;
        }

        let since = *session.emergency_since.get_or_insert(now);
        session.emergency_samples += 1;
        let sustained = now.saturating_duration_since(since);
        warn!(
            mspt,
            threshold,
            sustained_secs = sustained.as_secs_f64(),
            samples = session.emergency_samples,
            "MSPT above emergency threshold"
        );
        if sustained >= session.settings.emergency_duration {
            error!(
                mspt,
                threshold,
                sustained_secs = sustained.as_secs(),
                "Sustained MSPT over threshold, emergency abort"
            );
            self.force_stop(AbortReason::Emergency);
        }
    }

    fn on_recovery_poll(&mut self) {
        if self.state != BenchmarkState::Recovery {
            return;
        }
        let tps = self.collab.metrics.tps();
        let mspt = self.collab.metrics.mspt();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if tps >= session.settings.target_tps && mspt <= session.settings.target_mspt {
            info!(tps, mspt, "Host recovered");
            self.complete_recovery();
        } else {
            debug!(
                tps,
                mspt,
                target_tps = session.settings.target_tps,
                target_mspt = session.settings.target_mspt,
                "Still recovering"
            );
        }
    }

    // RECOVERY -> REPORTING -> IDLE
    fn complete_recovery(&mut self) {
        let now = self.clock.now();
        self.transition(BenchmarkState::Reporting);
        if let Some(mut session) = self.session.take() {
            session.tasks.cancel_all(&mut self.scheduler);
            let request = &session.request;
            self.collab.run_log.log_run(
                &request.profile.name,
                request.safe_mode,
                &request.initiator,
                RunOutcome::Ok,
                None,
            );
            let result = self.assemble_result(&session, now, None);
            if let Some(score) = &result.score {
                self.collab.hooks.broadcast(&format!(
                    "Benchmark complete: score {} ({}).",
                    score.final_score, score.grade
                ));
            }
            self.deliver(result, session.settings.export_enabled);
        }
        self.transition(BenchmarkState::Idle);
    }

    fn assemble_result(
        &self,
        session: &BenchmarkSession,
        now: Instant,
        abort: Option<AbortReason>,
    ) -> BenchmarkResult {
        let recovery_seconds = match (abort, session.recovery_started_at) {
            (None, Some(start)) => Some(now.saturating_duration_since(start).as_secs_f64()),
            _ => None,
        };
        let max_heap_mb = self.collab.metrics.max_memory_mb();
        let score = recovery_seconds
            .map(|secs| scoring::score(&session.settings.scoring, secs.round(), max_heap_mb));
        let benchmark_point = recovery_seconds
            .map(|secs| scoring::benchmark_point(secs, session.settings.point_divisor));

        let analysis = self.collab.world.analyze();
        let recommendations = match &session.baseline {
            Some(baseline) => self.collab.recommender.recommend(
                baseline,
                session.after_load.as_ref().unwrap_or(baseline),
                &analysis,
            ),
            None => Vec::new(),
        };

        BenchmarkResult {
            profile: session.request.profile.name.clone(),
            safe_mode: session.request.safe_mode,
            initiator: session.request.initiator.clone(),
            workload_seconds: session.workload_seconds(now),
            recovery_seconds,
            score,
            benchmark_point,
            baseline: session.baseline.clone(),
            after_load: session.after_load.clone(),
            system_info: self.collab.system.system_info(),
            analysis,
            recommendations,
            aborted: abort.is_some(),
            abort_reason: abort,
            timestamp: Utc::now(),
        }
    }

    fn deliver(&mut self, result: BenchmarkResult, export_enabled: bool) {
        self.collab.reporter.present(&result);
        if export_enabled && let Some(exporter) = self.collab.exporter.as_ref() {
            match exporter.export(&result) {
                Ok(path) => info!(path = %path.display(), "Result exported"),
                Err(err) => warn!(error = %err, "Result export failed"),
            }
        }
        self.last_result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_scales_with_tick_rate() {
        let t = Timing::default();
        assert_eq!(t.ticks_per_second, 20);
        assert_eq!(t.countdown_unit_ticks, 20);
        assert_eq!(t.progress_ticks, 40);
        assert_eq!(t.seconds(3), 60);

        let slow = Timing::for_tick_rate(0);
        assert_eq!(slow.ticks_per_second, 1);
        assert_eq!(slow.seconds(300), 300);
    }

    #[test]
    fn session_settings_freeze_config_values() {
        let config = BenchConfig::default();
        let s = SessionSettings::from_config(&config, "extreme");
        assert_eq!(s.global_timeout_seconds, 300);
        assert_eq!(s.emergency_duration, Duration::from_secs(10));
        assert_eq!(s.scoring.profile_base_points, 2000);
        assert_eq!(s.target_tps, 20.0);
        assert_eq!(s.target_mspt, 25.0);
    }
}
