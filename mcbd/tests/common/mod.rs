#![allow(dead_code)]

use chrono::Utc;
use mcb_common::clock::ManualClock;
use mcb_common::config::{BenchConfig, SafeModeSettings};
use mcb_common::errors::ExportError;
use mcb_common::runlog::RunLogger;
use mcb_common::types::{BenchmarkResult, BenchmarkState, MetricSnapshot, SystemInfo};
use mcb_telemetry::{MetricSource, SystemProbe};
use mcbd::confirmation::StartRequest;
use mcbd::host::{HostHooks, StaticWorlds};
use mcbd::orchestrator::{BenchmarkOrchestrator, Collaborators, Timing};
use mcbd::recommend::ThresholdRecommender;
use mcbd::report::{ReportSink, ResultExporter};
use mcbd::workload::{MixedWork, WorkFactory};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub use mcb_common::testing::init_test_logging;

pub const TICK: Duration = Duration::from_millis(50);

/// Two-second workload, five-second emergency window, 30 s deadline.
pub const QUICK_CONFIG: &str = r#"
[settings]
globalTimeoutSeconds = 30

[settings.emergency]
durationSeconds = 5

[profiles.quick]
durationSeconds = 2
loopCountPerTick = 160
emergencyMsptThreshold = 500.0

[profiles.long]
durationSeconds = 60
tickInterval = 5
loopCountPerTick = 16
emergencyMsptThreshold = 500.0

[minimumRamPerProfile]
quick = 1024
long = 1024
"#;

// ── Fakes ──

#[derive(Debug, Clone)]
pub struct MetricState {
    pub tps: f64,
    pub mspt: f64,
    pub used_mb: u64,
    pub max_mb: u64,
}

impl Default for MetricState {
    fn default() -> Self {
        Self {
            tps: 20.0,
            mspt: 10.0,
            used_mb: 512,
            max_mb: 2048,
        }
    }
}

pub struct FakeMetrics(pub Rc<RefCell<MetricState>>);

impl MetricSource for FakeMetrics {
    fn tps(&self) -> f64 {
        self.0.borrow().tps
    }

    fn mspt(&self) -> f64 {
        self.0.borrow().mspt
    }

    fn max_memory_mb(&self) -> u64 {
        self.0.borrow().max_mb
    }

    fn snapshot(&self) -> MetricSnapshot {
        let m = self.0.borrow();
        MetricSnapshot {
            tps: m.tps,
            mspt: m.mspt,
            system_cpu_pct: 10.0,
            process_cpu_pct: 5.0,
            memory_usage_pct: m.used_mb as f64 / m.max_mb as f64 * 100.0,
            used_memory_mb: m.used_mb,
            max_memory_mb: m.max_mb,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub broadcasts: Vec<String>,
    pub saves: u32,
    pub evacuations: u32,
    pub results: Vec<BenchmarkResult>,
    pub exports: u32,
}

struct RecordingHooks(Rc<RefCell<Recorded>>);

impl HostHooks for RecordingHooks {
    fn broadcast(&mut self, message: &str) {
        self.0.borrow_mut().broadcasts.push(message.to_string());
    }

    fn save_all(&mut self) -> anyhow::Result<()> {
        self.0.borrow_mut().saves += 1;
        Ok(())
    }

    fn evacuate(&mut self, _safe_mode: &SafeModeSettings) -> anyhow::Result<()> {
        self.0.borrow_mut().evacuations += 1;
        Ok(())
    }
}

struct RecordingSink(Rc<RefCell<Recorded>>);

impl ReportSink for RecordingSink {
    fn present(&mut self, result: &BenchmarkResult) {
        self.0.borrow_mut().results.push(result.clone());
    }
}

struct FakeExporter {
    recorded: Rc<RefCell<Recorded>>,
    fail: bool,
}

impl ResultExporter for FakeExporter {
    fn export(&self, _result: &BenchmarkResult) -> Result<PathBuf, ExportError> {
        self.recorded.borrow_mut().exports += 1;
        if self.fail {
            return Err(ExportError::Io {
                path: PathBuf::from("/nonexistent/results"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(PathBuf::from("results/fake.json"))
    }
}

struct FakeProbe;

impl SystemProbe for FakeProbe {
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            os_name: "TestOS".into(),
            os_version: "1".into(),
            arch: "x86_64".into(),
            cpu_model: "Test CPU".into(),
            cpu_cores: 4,
            total_memory_mb: 8192,
        }
    }
}

// ── Harness ──

pub struct Harness {
    pub orch: BenchmarkOrchestrator,
    pub clock: ManualClock,
    pub metrics: Rc<RefCell<MetricState>>,
    pub recorded: Rc<RefCell<Recorded>>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(toml: &str) -> Self {
        Self::build(toml, false, Box::new(MixedWork::for_profile))
    }

    pub fn with_failing_export(toml: &str) -> Self {
        Self::build(toml, true, Box::new(MixedWork::for_profile))
    }

    /// Sessions run `work` instead of the standard mix.
    pub fn with_work(toml: &str, work: WorkFactory) -> Self {
        Self::build(toml, false, work)
    }

    fn build(toml: &str, fail_export: bool, work: WorkFactory) -> Self {
        init_test_logging();
        let config = BenchConfig::from_toml(toml).expect("test config");
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = ManualClock::new();
        let metrics = Rc::new(RefCell::new(MetricState::default()));
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let collab = Collaborators {
            metrics: Box::new(FakeMetrics(Rc::clone(&metrics))),
            hooks: Box::new(RecordingHooks(Rc::clone(&recorded))),
            world: Box::new(StaticWorlds::default()),
            system: Box::new(FakeProbe),
            recommender: Box::new(ThresholdRecommender::default()),
            reporter: Box::new(RecordingSink(Rc::clone(&recorded))),
            exporter: Some(Box::new(FakeExporter {
                recorded: Rc::clone(&recorded),
                fail: fail_export,
            })),
            run_log: RunLogger::new(dir.path().join("runs.log")),
            work,
        };
        let orch = BenchmarkOrchestrator::new(
            Arc::new(config),
            collab,
            Arc::new(clock.clone()),
            Timing::default(),
        );
        Self {
            orch,
            clock,
            metrics,
            recorded,
            dir,
        }
    }

    /// Advance wall time by one tick period, then run the tick.
    pub fn step(&mut self) {
        self.clock.advance(TICK);
        self.orch.tick();
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Step until `done` holds; returns ticks taken, or `None` after `max`.
    pub fn run_until(&mut self, max: u64, mut done: impl FnMut(&Self) -> bool) -> Option<u64> {
        for n in 1..=max {
            self.step();
            if done(self) {
                return Some(n);
            }
        }
        None
    }

    pub fn request(&mut self, profile: &str, safe_mode: bool) {
        let profile = self.orch.config().profile(profile).expect("profile");
        self.orch
            .request_start(StartRequest {
                profile,
                safe_mode,
                initiator: "tester".into(),
            })
            .expect("request accepted");
    }

    /// Request and confirm; the session starts after the 60-tick grace delay.
    pub fn start(&mut self, profile: &str, safe_mode: bool) {
        self.request(profile, safe_mode);
        self.orch.confirm().expect("confirm");
    }

    pub fn state(&self) -> BenchmarkState {
        self.orch.state()
    }

    pub fn set_tps(&self, tps: f64) {
        self.metrics.borrow_mut().tps = tps;
    }

    pub fn set_mspt(&self, mspt: f64) {
        self.metrics.borrow_mut().mspt = mspt;
    }

    /// Broadcasts starting with `prefix`.
    pub fn broadcasts_with(&self, prefix: &str) -> Vec<String> {
        self.recorded
            .borrow()
            .broadcasts
            .iter()
            .filter(|m| m.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn results(&self) -> Vec<BenchmarkResult> {
        self.recorded.borrow().results.clone()
    }

    pub fn run_log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("runs.log")).unwrap_or_default()
    }
}
