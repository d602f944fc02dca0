//! Cross-target summaries, recomputed from scratch on every processed frame.

use std::fmt;

use serde::Serialize;

use crate::tracker::target::TargetUnit;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    /// Targets that have a seeded tracker
    pub tracked_count: usize,
    pub total_distance: f64,
    /// Mean of the non-zero per-target average speeds
    pub mean_average_speed: f64,
    pub max_speed: f64,
}

/// Summarize `targets` without touching them.
pub fn aggregate(targets: &[TargetUnit]) -> AggregateMetrics {
    let moving: Vec<f64> = targets
        .iter()
        .map(TargetUnit::average_speed)
        .filter(|speed| *speed != 0.0)
        .collect();
    let mean_average_speed = if moving.is_empty() {
        0.0
    } else {
        moving.iter().sum::<f64>() / moving.len() as f64
    };

    AggregateMetrics {
        tracked_count: targets.iter().filter(|t| t.is_seeded()).count(),
        total_distance: targets.iter().map(TargetUnit::total_distance).sum(),
        mean_average_speed,
        max_speed: targets
            .iter()
            .map(TargetUnit::max_speed)
            .fold(0.0, f64::max),
    }
}

impl fmt::Display for AggregateMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tracked: {} | distance: {:.1} px | avg speed: {:.2} px/s | max speed: {:.2} px/s",
            self.tracked_count, self.total_distance, self.mean_average_speed, self.max_speed
        )
    }
}
