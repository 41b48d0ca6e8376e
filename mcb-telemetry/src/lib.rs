//! Metric collection for MCBench: `/proc` readers, the background CPU
//! monitor and the combined [`MetricSampler`](sampler::MetricSampler).

pub mod collect;
pub mod sampler;
pub mod system;

pub use sampler::{CpuMonitor, CpuRing, MetricSampler, MetricSource, TickStatsSource};
pub use system::{ProcSystemProbe, SystemProbe};
