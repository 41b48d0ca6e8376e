//! Tuning advice derived from baseline vs. post-load metrics.

use mcb_common::config::RecommendationThresholds;
use mcb_common::types::{MetricSnapshot, WorldAnalysis};

pub const ALL_CLEAR: &str = "Server performance is optimal, no recommendations needed";

const CRITICAL_MSPT: f64 = 40.0;
const RECOVERY_TPS_DRIFT: f64 = 2.0;
const RECOVERY_MSPT_DRIFT: f64 = 10.0;
const MEMORY_GROWTH_PCT: f64 = 20.0;
const HEAP_PRESSURE_RATIO: f64 = 0.85;
const CPU_GROWTH_PCT: f64 = 30.0;
const PROCESS_CPU_PCT: f64 = 60.0;

pub trait Recommender {
    /// Never empty: a healthy run yields [`ALL_CLEAR`].
    fn recommend(
        &self,
        baseline: &MetricSnapshot,
        after_load: &MetricSnapshot,
        analysis: &WorldAnalysis,
    ) -> Vec<String>;
}

/// Fixed rule set keyed off `recommendations.thresholds`.
#[derive(Debug, Clone, Default)]
pub struct ThresholdRecommender {
    thresholds: RecommendationThresholds,
}

impl ThresholdRecommender {
    pub fn new(thresholds: RecommendationThresholds) -> Self {
        Self { thresholds }
    }

    fn tick_rules(&self, base: &MetricSnapshot, after: &MetricSnapshot, out: &mut Vec<String>) {
        if base.tps < self.thresholds.low_tps || base.mspt > self.thresholds.high_mspt {
            out.push("Consider reducing view-distance to 6-8 for better performance".into());
            out.push("Consider reducing simulation-distance to 6-8".into());
            if base.mspt > CRITICAL_MSPT {
                out.push("MSPT is high - consider reducing entity counts and plugin load".into());
            }
        }
        if (after.tps - base.tps).abs() > RECOVERY_TPS_DRIFT
            || (after.mspt - base.mspt).abs() > RECOVERY_MSPT_DRIFT
        {
            out.push("Server shows poor recovery - consider optimizing plugin configuration".into());
        }
    }

    fn memory_rules(&self, base: &MetricSnapshot, after: &MetricSnapshot, out: &mut Vec<String>) {
        if base.memory_usage_pct > self.thresholds.high_ram_usage {
            let suggested_gb = (base.max_memory_mb / 1024 + 2).max(4);
            out.push(format!(
                "High memory usage detected - consider increasing server RAM to {suggested_gb}GB"
            ));
            out.push("Enable garbage collection optimization flags".into());
        }
        if after.memory_usage_pct - base.memory_usage_pct > MEMORY_GROWTH_PCT {
            out.push(
                "Significant memory increase during load - check for memory leaks in plugins"
                    .into(),
            );
        }
        if base.used_memory_mb as f64 > base.max_memory_mb as f64 * HEAP_PRESSURE_RATIO {
            out.push("Memory usage is very high - raise the heap limit or reduce plugin count".into());
        }
    }

    fn cpu_rules(&self, base: &MetricSnapshot, after: &MetricSnapshot, out: &mut Vec<String>) {
        if base.system_cpu_pct > self.thresholds.high_cpu_usage {
            out.push("High CPU usage detected - consider upgrading server CPU".into());
            out.push("Review plugin performance and disable unnecessary ones".into());
        }
        if after.system_cpu_pct - base.system_cpu_pct > CPU_GROWTH_PCT {
            out.push("Poor CPU scaling under load - optimize server settings".into());
        }
        if base.process_cpu_pct > PROCESS_CPU_PCT {
            out.push("Server process using high CPU - check for inefficient plugins".into());
        }
    }

    fn world_rules(&self, analysis: &WorldAnalysis, out: &mut Vec<String>) {
        let chunks = analysis.total_chunks();
        let entities = analysis.total_entities();
        let high_chunks = self.thresholds.high_chunk_count;

        if chunks > high_chunks {
            let view_distance = 10u64.saturating_sub(chunks / 100).max(6);
            out.push(format!(
                "High chunk count ({chunks}) - reduce view-distance to {view_distance}"
            ));
        }
        if entities > self.thresholds.high_entity_count {
            out.push(format!("High entity count ({entities}) - implement entity cleanup"));
            out.push("Consider reducing mob spawn rates in server.properties".into());
        }
        for world in &analysis.worlds {
            if world.loaded_chunks > high_chunks / 2 {
                out.push(format!(
                    "World '{}' has high chunk count ({}) - consider world border or chunk unloading",
                    world.name, world.loaded_chunks
                ));
            }
        }
    }
}

impl Recommender for ThresholdRecommender {
    fn recommend(
        &self,
        baseline: &MetricSnapshot,
        after_load: &MetricSnapshot,
        analysis: &WorldAnalysis,
    ) -> Vec<String> {
        let mut out = Vec::new();
        self.tick_rules(baseline, after_load, &mut out);
        self.memory_rules(baseline, after_load, &mut out);
        self.cpu_rules(baseline, after_load, &mut out);
        self.world_rules(analysis, &mut out);
        if out.is_empty() {
            out.push(ALL_CLEAR.to_string());
        }
        out
    }
}
