//! Smoothed host metrics.
//!
//! TPS and MSPT are read straight from the host's tick counters. CPU load is
//! noisy, so a background thread samples it every 500 ms into two 20-slot
//! rings (about ten seconds of history) and publishes the rounded averages as
//! plain scalars. The rings never leave that thread.

use crate::collect::cpu::{CpuLoadSource, CpuReading};
use crate::collect::memory::HeapSource;
use chrono::Utc;
use mcb_common::types::MetricSnapshot;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RING_CAPACITY: usize = 20;
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_TPS: f64 = 20.0;
const FALLBACK_MSPT: f64 = 50.0;

/// Host-provided tick performance counters.
pub trait TickStatsSource: Send + Sync {
    fn tps(&self) -> f64;
    fn mspt(&self) -> f64;
}

/// What the orchestrator reads metrics through.
pub trait MetricSource {
    fn tps(&self) -> f64;
    fn mspt(&self) -> f64;
    fn max_memory_mb(&self) -> u64;
    fn snapshot(&self) -> MetricSnapshot;
}

// ── Ring ────────────────────────────────────────────────────────────────

/// Fixed-size circular buffer of percentage samples.
#[derive(Debug, Clone)]
pub struct CpuRing {
    slots: [f64; RING_CAPACITY],
    next: usize,
}

impl Default for CpuRing {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuRing {
    /// Every slot starts as an invalid placeholder.
    pub fn new() -> Self {
        Self {
            slots: [f64::NAN; RING_CAPACITY],
            next: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.slots[self.next] = value;
        self.next = (self.next + 1) % RING_CAPACITY;
    }

    /// Mean of the finite, non-negative slots rounded to two decimals;
    /// 0.0 when none are valid.
    pub fn average(&self) -> f64 {
        let (sum, count) = self
            .slots
            .iter()
            .filter(|v| v.is_finite() && **v >= 0.0)
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            return 0.0;
        }
        round2(sum / count as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Published averages ──────────────────────────────────────────────────

/// Single-writer, multi-reader handoff of the two averages.
#[derive(Debug, Default)]
pub struct PublishedCpu {
    system_bits: AtomicU64,
    process_bits: AtomicU64,
}

impl PublishedCpu {
    fn store(&self, system: f64, process: f64) {
        self.system_bits.store(system.to_bits(), Ordering::Release);
        self.process_bits.store(process.to_bits(), Ordering::Release);
    }

    pub fn system(&self) -> f64 {
        f64::from_bits(self.system_bits.load(Ordering::Acquire))
    }

    pub fn process(&self) -> f64 {
        f64::from_bits(self.process_bits.load(Ordering::Acquire))
    }
}

// ── Background monitor ──────────────────────────────────────────────────

/// Owns the sampling thread. Dropping it stops and joins the thread.
pub struct CpuMonitor {
    published: Arc<PublishedCpu>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CpuMonitor {
    pub fn spawn<S: CpuLoadSource>(source: S, interval: Duration) -> std::io::Result<Self> {
        let published = Arc::new(PublishedCpu::default());
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&published);

        let handle = std::thread::Builder::new()
            .name("mcb-cpu-monitor".to_string())
            .spawn(move || run_monitor(source, interval, &shared, &stop_rx))?;

        info!(interval_ms = interval.as_millis() as u64, "CPU monitor started");
        Ok(Self {
            published,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn published(&self) -> &PublishedCpu {
        &self.published
    }

    pub fn stop(&mut self) {
        // Dropping the sender wakes the thread out of recv_timeout.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("CPU monitor thread panicked");
            } else {
                info!("CPU monitor stopped");
            }
        }
    }
}

impl Drop for CpuMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_monitor<S: CpuLoadSource>(
    mut source: S,
    interval: Duration,
    published: &PublishedCpu,
    stop_rx: &mpsc::Receiver<()>,
) {
    let mut system_ring = CpuRing::new();
    let mut process_ring = CpuRing::new();
    loop {
        let CpuReading {
            system_pct,
            process_pct,
        } = source.sample();
        system_ring.push(system_pct);
        process_ring.push(process_pct);
        published.store(system_ring.average(), process_ring.average());

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("CPU monitor loop exited");
}

// ── Sampler ─────────────────────────────────────────────────────────────

pub struct MetricSampler {
    ticks: Arc<dyn TickStatsSource>,
    heap: Box<dyn HeapSource>,
    cpu: CpuMonitor,
}

impl MetricSampler {
    pub fn new(ticks: Arc<dyn TickStatsSource>, heap: Box<dyn HeapSource>, cpu: CpuMonitor) -> Self {
        Self { ticks, heap, cpu }
    }

    pub fn system_cpu(&self) -> f64 {
        self.cpu.published().system()
    }

    pub fn process_cpu(&self) -> f64 {
        self.cpu.published().process()
    }

    pub fn shutdown(&mut self) {
        self.cpu.stop();
    }
}

impl MetricSource for MetricSampler {
    fn tps(&self) -> f64 {
        let tps = self.ticks.tps();
        if tps.is_finite() { tps.clamp(0.0, MAX_TPS) } else { MAX_TPS }
    }

    fn mspt(&self) -> f64 {
        let mspt = self.ticks.mspt();
        if mspt.is_finite() && mspt >= 0.0 { mspt } else { FALLBACK_MSPT }
    }

    fn max_memory_mb(&self) -> u64 {
        self.heap.heap().max_mb
    }

    fn snapshot(&self) -> MetricSnapshot {
        let heap = self.heap.heap();
        MetricSnapshot {
            tps: self.tps(),
            mspt: self.mspt(),
            system_cpu_pct: self.system_cpu(),
            process_cpu_pct: self.process_cpu(),
            memory_usage_pct: round2(heap.usage_pct()),
            used_memory_mb: heap.used_mb,
            max_memory_mb: heap.max_mb,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::memory::HeapUsage;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::time::Instant;

    #[test]
    fn all_invalid_ring_averages_to_zero() {
        let mut ring = CpuRing::new();
        assert_eq!(ring.average(), 0.0);
        for i in 0..RING_CAPACITY {
            ring.push(if i % 2 == 0 { f64::NAN } else { -1.0 });
        }
        assert_eq!(ring.average(), 0.0);
    }

    #[test]
    fn cold_start_averages_only_valid_samples() {
        let mut ring = CpuRing::new();
        ring.push(10.0);
        ring.push(20.0);
        ring.push(f64::NAN);
        assert_eq!(ring.average(), 15.0);
    }

    #[test]
    fn ring_overwrites_oldest_and_rounds() {
        let mut ring = CpuRing::new();
        ring.push(100.0);
        for _ in 0..RING_CAPACITY {
            ring.push(1.0 / 3.0);
        }
        assert_eq!(ring.average(), 0.33);
    }

    proptest! {
        #[test]
        fn average_stays_within_valid_range(samples in proptest::collection::vec(
            prop_oneof![Just(f64::NAN), Just(-5.0), 0.0f64..100.0], 0..60)) {
            let mut ring = CpuRing::new();
            for s in &samples {
                ring.push(*s);
            }
            let avg = ring.average();
            prop_assert!(avg.is_finite());
            prop_assert!((0.0..=100.0).contains(&avg));
        }
    }

    struct ScriptedLoad(Vec<CpuReading>);

    impl CpuLoadSource for ScriptedLoad {
        fn sample(&mut self) -> CpuReading {
            self.0.pop().unwrap_or(CpuReading {
                system_pct: 40.0,
                process_pct: 10.0,
            })
        }
    }

    fn wait_for(pred: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if pred() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn monitor_publishes_and_stops() {
        let mut monitor = CpuMonitor::spawn(
            ScriptedLoad(vec![CpuReading::INVALID]),
            Duration::from_millis(5),
        )
        .unwrap();
        assert!(wait_for(|| monitor.published().system() == 40.0));
        assert_eq!(monitor.published().process(), 10.0);
        monitor.stop();
        monitor.stop();
    }

    struct FixedTicks(Mutex<(f64, f64)>);

    impl TickStatsSource for FixedTicks {
        fn tps(&self) -> f64 {
            self.0.lock().unwrap().0
        }
        fn mspt(&self) -> f64 {
            self.0.lock().unwrap().1
        }
    }

    struct FixedHeap;

    impl HeapSource for FixedHeap {
        fn heap(&self) -> HeapUsage {
            HeapUsage {
                used_mb: 1024,
                max_mb: 4096,
            }
        }
    }

    #[test]
    fn snapshot_clamps_and_combines() {
        let ticks = Arc::new(FixedTicks(Mutex::new((23.5, 12.0))));
        let monitor = CpuMonitor::spawn(ScriptedLoad(Vec::new()), Duration::from_millis(5)).unwrap();
        let sampler = MetricSampler::new(ticks.clone(), Box::new(FixedHeap), monitor);
        assert!(wait_for(|| sampler.system_cpu() == 40.0));

        let snap = sampler.snapshot();
        assert_eq!(snap.tps, MAX_TPS);
        assert_eq!(snap.mspt, 12.0);
        assert_eq!(snap.used_memory_mb, 1024);
        assert_eq!(snap.max_memory_mb, 4096);
        assert_eq!(snap.memory_usage_pct, 25.0);
        assert_eq!(snap.system_cpu_pct, 40.0);

        *ticks.0.lock().unwrap() = (f64::NAN, f64::NAN);
        assert_eq!(sampler.tps(), MAX_TPS);
        assert_eq!(sampler.mspt(), 50.0);
        assert_eq!(sampler.max_memory_mb(), 4096);
    }
}
