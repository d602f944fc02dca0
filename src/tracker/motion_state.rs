use std::fmt;

use serde::{Deserialize, Serialize};

/// Default step, in pixels, a target must exceed between two samples to count as moving.
///
/// Independent of frame size and frame rate; sessions take it from
/// [`EngineConfig::movement_threshold`](crate::config::EngineConfig).
pub const MOVEMENT_THRESHOLD: f64 = 2.0;

/// Movement classification recorded for every path point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotionState {
    /// Displaced by more than the threshold since the previous sample,
    /// or the first sample of a path
    #[default]
    Moving,
    /// Displaced by at most the threshold
    Resting,
}

impl MotionState {
    /// Classify a step of `distance` pixels. A step equal to the threshold is resting.
    #[inline]
    pub fn classify(distance: f64, threshold: f64) -> Self {
        if distance > threshold {
            MotionState::Moving
        } else {
            MotionState::Resting
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MotionState::Moving => "Moving",
            MotionState::Resting => "Resting",
        }
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
