//! Synthetic CPU workload.
//!
//! Each invocation burns `loopCountPerTick x intensityMultiplier` units split
//! across four blocks: floating-point math (1/4), trial-division primality
//! (1/8), 50x50 matrix multiplication (1/16) and string/hash/big-integer work
//! (the remainder). Every block keeps a live data dependency on its result so
//! the optimizer cannot drop it.

use mcb_common::clock::Clock;
use mcb_common::types::BenchmarkProfile;
use std::fmt::Write as _;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::hint::black_box;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const MATRIX_SIZE: usize = 50;
const ROTATE_EVERY: u64 = 10;
const BIGINT_EVERY: u64 = 100;
const ACCUMULATOR_LIMIT: f64 = 1e10;
const ACCUMULATOR_MODULUS: f64 = 1e6;

type Matrix = [[f64; MATRIX_SIZE]; MATRIX_SIZE];

/// Result of one workload invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Work was done (or the generator is finished and ignores the call).
    Continuing,
    /// Duration elapsed. Returned exactly once.
    Completed,
    /// The work itself failed; the generator is finished.
    Faulted(String),
}

/// How one invocation's loop budget is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPartition {
    pub math: u64,
    pub primes: u64,
    pub matrix: u64,
    pub misc: u64,
}

impl LoopPartition {
    pub fn of(total: u64) -> Self {
        let math = total / 4;
        let primes = total / 8;
        let matrix = total / 16;
        Self {
            math,
            primes,
            matrix,
            misc: total - math - primes - matrix,
        }
    }
}

/// One invocation's worth of CPU work.
pub trait WorkUnit {
    fn run(&mut self, partition: LoopPartition);
}

/// Builds the work body for a session's profile.
pub type WorkFactory = Box<dyn Fn(&BenchmarkProfile) -> Box<dyn WorkUnit>>;

/// The standard four-block mix, with its reused matrices.
pub struct MixedWork {
    matrix_a: Box<Matrix>,
    matrix_b: Box<Matrix>,
    matrix_out: Box<Matrix>,
}

impl Default for MixedWork {
    fn default() -> Self {
        Self::new()
    }
}

impl MixedWork {
    pub fn new() -> Self {
        Self {
            matrix_a: random_matrix(),
            matrix_b: random_matrix(),
            matrix_out: Box::new([[0.0; MATRIX_SIZE]; MATRIX_SIZE]),
        }
    }

    /// [`WorkFactory`] body for the standard mix.
    pub fn for_profile(_profile: &BenchmarkProfile) -> Box<dyn WorkUnit> {
        Box::new(Self::new())
    }

    fn matrix_block(&mut self, count: u64) {
        for op in 0..count {
            multiply(&self.matrix_a, &self.matrix_b, &mut self.matrix_out);
            if op % ROTATE_EVERY == 0 {
                rotate(&mut self.matrix_a);
            }
        }
        black_box(&self.matrix_out);
    }
}

impl WorkUnit for MixedWork {
    fn run(&mut self, partition: LoopPartition) {
        black_box(math_block(partition.math));
        black_box(prime_block(partition.primes));
        self.matrix_block(partition.matrix);
        black_box(misc_block(partition.misc));
    }
}

pub struct WorkloadGenerator {
    profile: BenchmarkProfile,
    clock: Arc<dyn Clock>,
    started_at: Instant,
    duration: Duration,
    partition: LoopPartition,
    work: Box<dyn WorkUnit>,
    ticks: u64,
    finished: bool,
}

impl WorkloadGenerator {
    pub fn new(profile: BenchmarkProfile, clock: Arc<dyn Clock>) -> Self {
        Self::with_work(profile, clock, Box::new(MixedWork::new()))
    }

    pub fn with_work(
        profile: BenchmarkProfile,
        clock: Arc<dyn Clock>,
        work: Box<dyn WorkUnit>,
    ) -> Self {
        let started_at = clock.now();
        let duration = Duration::from_secs(profile.duration_seconds);
        let partition = LoopPartition::of(profile.adjusted_loop_count());
        info!(
            profile = %profile.name,
            duration_secs = profile.duration_seconds,
            math = partition.math,
            primes = partition.primes,
            matrix = partition.matrix,
            misc = partition.misc,
            "Workload generator ready"
        );
        Self {
            profile,
            clock,
            started_at,
            duration,
            partition,
            work,
            ticks: 0,
            finished: false,
        }
    }

    /// Run one bounded unit of work, or report completion.
    ///
    /// Elapsed time is checked before any work, so the invocation that
    /// observes completion does no work and is not counted.
    pub fn tick(&mut self) -> TickOutcome {
        if self.finished {
            return TickOutcome::Continuing;
        }
        if self.elapsed() >= self.duration {
            self.finished = true;
            info!(
                profile = %self.profile.name,
                ticks = self.ticks,
                elapsed_ms = self.elapsed().as_millis() as u64,
                "Workload duration reached"
            );
            return TickOutcome::Completed;
        }

        let partition = self.partition;
        let work = &mut self.work;
        match panic::catch_unwind(AssertUnwindSafe(|| work.run(partition))) {
            Ok(()) => {
                self.ticks += 1;
                trace!(tick = self.ticks, "Workload tick done");
                TickOutcome::Continuing
            }
            Err(payload) => {
                self.finished = true;
                let message = panic_message(payload.as_ref());
                warn!(
                    profile = %self.profile.name,
                    ticks = self.ticks,
                    error = %message,
                    "Workload tick panicked"
                );
                TickOutcome::Faulted(message)
            }
        }
    }

    /// Stop producing work. Safe to call at any time, repeatedly.
    pub fn stop(&mut self) {
        if !self.finished {
            debug!(profile = %self.profile.name, ticks = self.ticks, "Workload stopped");
        }
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }

    pub fn total_seconds(&self) -> u64 {
        self.profile.duration_seconds
    }

    pub fn completion_pct(&self) -> f64 {
        (self.elapsed_seconds() as f64 * 100.0 / self.profile.duration_seconds as f64).min(100.0)
    }

    /// Invocations that did work.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }
}

fn random_matrix() -> Box<Matrix> {
    let mut m = Box::new([[0.0; MATRIX_SIZE]; MATRIX_SIZE]);
    for row in m.iter_mut() {
        for cell in row.iter_mut() {
            *cell = 0.1 + fastrand::f64() * 9.9;
        }
    }
    m
}

fn math_block(count: u64) -> f64 {
    let mut acc = 1.0_f64;
    for i in 0..count {
        let v = (i % 1000) as f64 + 1.0;
        acc += v.sqrt();
        acc += (v / 100.0).sin();
        acc += (v / 100.0).cos();
        acc += v.ln();
        acc += v.powf(0.5);
        if acc > ACCUMULATOR_LIMIT {
            acc %= ACCUMULATOR_MODULUS;
        }
    }
    acc
}

fn prime_block(count: u64) -> u64 {
    (0..count)
        .filter(|i| is_prime(1000 + i % 10_000))
        .count() as u64
}

/// Trial division with 6k +/- 1 stepping.
pub fn is_prime(n: u64) -> bool {
    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5;
    while i * i <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

fn multiply(a: &Matrix, b: &Matrix, out: &mut Matrix) {
    for i in 0..MATRIX_SIZE {
        for j in 0..MATRIX_SIZE {
            let mut sum = 0.0;
            for k in 0..MATRIX_SIZE {
                sum += a[i][k] * b[k][j];
            }
            out[i][j] = sum;
        }
    }
}

/// In-place 90 degree rotation, layer by layer.
fn rotate(m: &mut Matrix) {
    let n = MATRIX_SIZE;
    for i in 0..n / 2 {
        for j in i..n - i - 1 {
            let tmp = m[i][j];
            m[i][j] = m[n - 1 - j][i];
            m[n - 1 - j][i] = m[n - 1 - i][n - 1 - j];
            m[n - 1 - i][n - 1 - j] = m[j][n - 1 - i];
            m[j][n - 1 - i] = tmp;
        }
    }
}

fn misc_block(count: u64) -> u128 {
    let mut folded = 0u128;
    let mut text = String::with_capacity(1024);
    for i in 0..count {
        text.clear();
        for j in 0..100 {
            let _ = write!(text, "benchmark{j}");
        }
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();
        if i % BIGINT_EVERY == 0 {
            let big = u128::from(hash)
                .wrapping_mul(u128::from(i + 1))
                .wrapping_add(1);
            folded ^= big;
        }
    }
    folded
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "workload panicked".to_string()
    }
}
