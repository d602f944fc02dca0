//! Immutable views of a session handed to consumers: per-frame snapshots for
//! rendering, the final report and registry listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MAX_TARGETS;
use crate::error::ValidationError;
use crate::session::state::{SessionId, SessionState};
use crate::tracker::{AggregateMetrics, Color, MotionState, Point, Region};

/// Logical shape of a session creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub target_count: usize,
    pub initial_regions: Vec<Region>,
    #[serde(default)]
    pub monochrome: bool,
}

impl SessionRequest {
    /// One target per region.
    pub fn new(initial_regions: Vec<Region>, monochrome: bool) -> Self {
        Self {
            target_count: initial_regions.len(),
            initial_regions,
            monochrome,
        }
    }

    /// Check the target count against `1..=max_targets` (never above
    /// [`MAX_TARGETS`]) and that every target has exactly one region.
    pub fn validate(&self, max_targets: usize) -> Result<(), ValidationError> {
        let max = max_targets.clamp(1, MAX_TARGETS);
        if !(1..=max).contains(&self.target_count) {
            return Err(ValidationError::TargetCount {
                count: self.target_count,
                max,
            });
        }
        if self.initial_regions.len() != self.target_count {
            return Err(ValidationError::RegionCount {
                expected: self.target_count,
                got: self.initial_regions.len(),
            });
        }
        Ok(())
    }
}

/// Rendering-relevant state of one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSnapshot {
    pub id: u32,
    pub color: Color,
    pub seeded: bool,
    /// Whether the latest frame located this target
    pub found: bool,
    pub region: Region,
    pub center: Option<Point>,
    /// Movement state of the newest path point
    pub state: Option<MotionState>,
    pub label: String,
    pub path: Vec<Point>,
    pub total_distance: f64,
    pub current_speed: f64,
    pub average_speed: f64,
    pub max_speed: f64,
}

/// Point-in-time copy of a session, safe to hand to another thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub session_id: SessionId,
    /// Frames processed so far
    pub frame_index: u64,
    pub state: SessionState,
    /// Rendering hint, passed through untouched
    pub monochrome: bool,
    pub targets: Vec<TargetSnapshot>,
    pub metrics: AggregateMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub id: u32,
    pub point_count: usize,
    pub total_distance: f64,
    pub average_speed: f64,
    pub max_speed: f64,
}

/// Final report of a stopped session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub session_id: SessionId,
    pub duration_seconds: f64,
    pub total_frames: u64,
    #[serde(rename = "perTargetSummary")]
    pub targets: Vec<TargetSummary>,
}

/// One entry of [`SessionRegistry::list`](crate::session::SessionRegistry::list).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListing {
    pub id: SessionId,
    pub target_count: usize,
    pub created_at: DateTime<Utc>,
    pub frame_count: u64,
    pub is_active: bool,
    pub has_results: bool,
}
