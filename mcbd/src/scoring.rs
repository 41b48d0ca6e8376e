//! Score and benchmark point.
//!
//! ```text
//! basePoints  = scoring.<profile>.profileBasePoints
//! timePenalty = floor(recoverySeconds x penaltyPerSecond)
//! ramBonus    = floor(maxHeapMB x 1.75)
//! finalScore  = basePoints - timePenalty + ramBonus
//! ```
//!
//! Each term is truncated on its own before they are combined.

use mcb_common::config::ScoringSettings;
use mcb_common::types::{Grade, ScoreResult};

pub const RAM_BONUS_PER_MB: f64 = 1.75;
pub const DEFAULT_POINT_DIVISOR: f64 = 50000.0;

pub fn score(coefficients: &ScoringSettings, recovery_seconds: f64, max_heap_mb: u64) -> ScoreResult {
    let base_points = coefficients.profile_base_points;
    let time_penalty = (recovery_seconds * coefficients.penalty_per_second).floor() as i64;
    let ram_bonus = (max_heap_mb as f64 * RAM_BONUS_PER_MB).floor() as i64;
    let final_score = base_points - time_penalty + ram_bonus;
    ScoreResult {
        base_points,
        time_penalty,
        ram_bonus,
        final_score,
        grade: Grade::for_score(final_score),
        recovery_seconds,
        penalty_per_second: coefficients.penalty_per_second,
        max_heap_mb,
    }
}

/// `recoverySeconds / divisor`, or 0 for a non-positive duration.
pub fn benchmark_point(recovery_seconds: f64, divisor: f64) -> f64 {
    if recovery_seconds <= 0.0 || divisor <= 0.0 {
        return 0.0;
    }
    recovery_seconds / divisor
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn normal() -> ScoringSettings {
        ScoringSettings {
            profile_base_points: 1000,
            penalty_per_second: 10.0,
        }
    }

    #[test]
    fn normal_profile_35_seconds() {
        let result = score(&normal(), 35.0, 2048);
        assert_eq!(result.time_penalty, 350);
        assert_eq!(result.ram_bonus, 3584);
        assert_eq!(result.final_score, 4234);
        assert_eq!(result.grade, Grade::S);
        assert_eq!(
            result.formula(),
            "1000 - floor(35.00s x 10) + floor(2048MB x 1.75) = 1000 - 350 + 3584 = 4234"
        );
    }

    #[test]
    fn terms_truncate_independently() {
        let coeffs = ScoringSettings {
            profile_base_points: 100,
            penalty_per_second: 2.5,
        };
        // 3.3 * 2.5 = 8.25 -> 8; 3 * 1.75 = 5.25 -> 5
        let result = score(&coeffs, 3.3, 3);
        assert_eq!(result.time_penalty, 8);
        assert_eq!(result.ram_bonus, 5);
        assert_eq!(result.final_score, 97);
    }

    #[test]
    fn benchmark_point_values() {
        assert!((benchmark_point(35.0, DEFAULT_POINT_DIVISOR) - 0.0007).abs() < 1e-12);
        assert_eq!(benchmark_point(0.0, DEFAULT_POINT_DIVISOR), 0.0);
        assert_eq!(benchmark_point(-5.0, DEFAULT_POINT_DIVISOR), 0.0);
    }

    proptest! {
        #[test]
        fn longer_recovery_never_scores_higher(a in 0.0f64..10_000.0, b in 0.0f64..10_000.0, heap in 0u64..65_536) {
            let (short, long) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(score(&normal(), short, heap).final_score >= score(&normal(), long, heap).final_score);
        }

        #[test]
        fn grade_is_monotonic(a in -1000i64..5000, b in -1000i64..5000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(Grade::for_score(lo) <= Grade::for_score(hi));
        }
    }
}
