//! Single tracked target: one tracking capability plus its kinematic history.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::error::InitError;
use crate::export::PathRow;
use crate::frame::Frame;
use crate::session::{TargetSnapshot, TargetSummary};
use crate::tracker::capability::TrackingCapability;
use crate::tracker::motion_state::{MOVEMENT_THRESHOLD, MotionState};
use crate::tracker::rect::{Point, Region};

/// RGB display color.
pub type Color = [u8; 3];

/// Display colors, assigned to targets in id order and reused past nine.
pub const TARGET_PALETTE: [Color; 9] = [
    [0, 255, 0],     // green
    [0, 0, 255],     // blue
    [255, 0, 0],     // red
    [255, 255, 0],   // yellow
    [255, 0, 255],   // magenta
    [0, 255, 255],   // cyan
    [255, 128, 0],   // orange
    [128, 0, 128],   // purple
    [255, 192, 203], // pink
];

/// Kinematic parameters shared by every target of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    /// Path cap; `None` keeps every point
    pub max_path_len: Option<usize>,
    /// Strictly larger steps are classified as moving
    pub movement_threshold: f64,
    /// Seconds assumed between samples that share a timestamp
    pub nominal_interval: f64,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            max_path_len: None,
            movement_threshold: MOVEMENT_THRESHOLD,
            nominal_interval: 1.0 / 30.0,
        }
    }
}

/// One recorded path sample. Speeds and distance are the values at the time
/// the sample was taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathEntry {
    pub point: Point,
    pub state: MotionState,
    pub frame_index: u64,
    pub cumulative_distance: f64,
    pub average_speed: f64,
    pub max_speed: f64,
}

/// Result of advancing a target by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub found: bool,
    pub center: Option<Point>,
}

impl Outcome {
    fn lost() -> Self {
        Self {
            found: false,
            center: None,
        }
    }
}

/// A tracked target.
///
/// Owns its tracking capability exclusively. Path points and movement states
/// are stored together, so both sequences always have the same length.
pub struct TargetUnit {
    /// 1-based target identifier
    id: u32,
    color: Color,
    /// Declared region before seeding, last tracked region afterwards
    region: Region,
    tracker: Option<Box<dyn TrackingCapability>>,
    kinematics: Kinematics,
    path: VecDeque<PathEntry>,
    total_distance: f64,
    current_speed: f64,
    average_speed: f64,
    max_speed: f64,
    last_point: Option<Point>,
    last_timestamp: Option<f64>,
    tracking_start: Option<f64>,
    /// Frames this target has been advanced through since seeding
    frames_seen: u64,
    /// Whether the most recent seed or advance located the target
    found: bool,
}

impl TargetUnit {
    /// Create an unseeded target.
    pub fn new(id: u32, region: Region, kinematics: Kinematics) -> Self {
        let color = TARGET_PALETTE[(id.saturating_sub(1) as usize) % TARGET_PALETTE.len()];
        Self {
            id,
            color,
            region,
            tracker: None,
            kinematics,
            path: VecDeque::new(),
            total_distance: 0.0,
            current_speed: 0.0,
            average_speed: 0.0,
            max_speed: 0.0,
            last_point: None,
            last_timestamp: None,
            tracking_start: None,
            frames_seen: 0,
            found: false,
        }
    }

    /// Hand `tracker` to this target and lock it onto `region` of `frame`.
    ///
    /// On success the region's center becomes a new path point classified as
    /// moving, without adding distance. On failure nothing changes and any
    /// previous tracker is kept.
    pub fn seed(
        &mut self,
        mut tracker: Box<dyn TrackingCapability>,
        frame: &Frame,
        region: Region,
        now: f64,
    ) -> Result<(), InitError> {
        if !tracker.initialize(frame, region) {
            return Err(InitError::CapabilityRejected {
                target: self.id,
                region,
            });
        }

        let center = region.center();
        self.tracker = Some(tracker);
        self.region = region;
        self.found = true;
        self.last_point = Some(center);
        self.last_timestamp = Some(now);
        self.tracking_start.get_or_insert(now);
        self.push_entry(center, MotionState::Moving);
        Ok(())
    }

    /// Track the target into `frame`, sampled at `now` seconds.
    ///
    /// Losing the target only zeroes the current speed; path and distance are
    /// kept and tracking resumes when the capability finds it again.
    pub fn advance(&mut self, frame: &Frame, now: f64) -> Outcome {
        let Some(tracker) = self.tracker.as_mut() else {
            return Outcome::lost();
        };
        self.frames_seen += 1;

        let (found, region) = tracker.advance(frame);
        if !found {
            self.found = false;
            self.current_speed = 0.0;
            return Outcome::lost();
        }

        let center = region.center();
        let step = self.last_point.map(|prev| prev.distance_to(&center));
        let state = match step {
            Some(distance) => MotionState::classify(distance, self.kinematics.movement_threshold),
            None => MotionState::Moving,
        };
        let distance = step.unwrap_or(0.0);
        self.total_distance += distance;

        let dt = self
            .last_timestamp
            .map(|t| now - t)
            .filter(|dt| *dt > 0.0)
            .unwrap_or(self.kinematics.nominal_interval);
        self.current_speed = distance / dt;
        self.max_speed = self.max_speed.max(self.current_speed);

        let start = *self.tracking_start.get_or_insert(now);
        let elapsed = now - start;
        if elapsed > 0.0 {
            self.average_speed = self.total_distance / elapsed;
        }

        self.region = region;
        self.found = true;
        self.last_point = Some(center);
        self.last_timestamp = Some(now);
        self.push_entry(center, state);

        Outcome {
            found: true,
            center: Some(center),
        }
    }

    /// Forget the recorded path and every derived quantity. The tracker stays
    /// attached and the next located point starts a new path.
    pub fn clear_path(&mut self) {
        self.path.clear();
        self.total_distance = 0.0;
        self.current_speed = 0.0;
        self.average_speed = 0.0;
        self.max_speed = 0.0;
        self.last_point = None;
        self.last_timestamp = None;
        self.tracking_start = None;
    }

    /// Replace the declared region of a target that has not been seeded yet.
    pub(crate) fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    /// An unseeded copy with the same identity, region and parameters.
    pub(crate) fn unseeded(&self) -> Self {
        Self::new(self.id, self.region, self.kinematics)
    }

    fn push_entry(&mut self, point: Point, state: MotionState) {
        if let Some(cap) = self.kinematics.max_path_len {
            while self.path.len() >= cap.max(1) {
                self.path.pop_front();
            }
        }
        self.path.push_back(PathEntry {
            point,
            state,
            frame_index: self.frames_seen,
            cumulative_distance: self.total_distance,
            average_speed: self.average_speed,
            max_speed: self.max_speed,
        });
    }

    /// One-based target number within the session.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Fixed display color assigned from the palette.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Last region reported by the tracker, or the declared region before seeding.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Whether a tracker has been initialized for this target.
    pub fn is_seeded(&self) -> bool {
        self.tracker.is_some()
    }

    /// Whether the target was located on the latest frame.
    pub fn is_found(&self) -> bool {
        self.found
    }

    /// Recorded path entries, oldest first. Capped paths drop their oldest entries.
    pub fn path(&self) -> &VecDeque<PathEntry> {
        &self.path
    }

    /// Centers along the retained path.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.path.iter().map(|e| e.point)
    }

    /// Motion state of each retained path entry.
    pub fn states(&self) -> impl Iterator<Item = MotionState> + '_ {
        self.path.iter().map(|e| e.state)
    }

    /// Most recent center, kept even after the path is capped.
    pub fn last_point(&self) -> Option<Point> {
        self.last_point
    }

    /// Distance in pixels over the whole session, including evicted path entries.
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Speed over the latest step in pixels per second; zero while lost.
    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    /// Total distance over time since the first tracked frame.
    pub fn average_speed(&self) -> f64 {
        self.average_speed
    }

    /// Highest step speed seen so far.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Per-target totals for the final report.
    pub fn summary(&self) -> TargetSummary {
        TargetSummary {
            id: self.id,
            point_count: self.path.len(),
            total_distance: self.total_distance,
            average_speed: self.average_speed,
            max_speed: self.max_speed,
        }
    }

    /// Serializable view of this target for a session snapshot.
    pub fn snapshot(&self) -> TargetSnapshot {
        let state = self.path.back().map(|e| e.state);
        let label = match (self.is_seeded(), self.found, state) {
            (false, _, _) => format!("Target {}: Unseeded", self.id),
            (true, false, _) => format!("Target {}: Lost", self.id),
            (true, true, Some(state)) => format!("Target {}: {}", self.id, state),
            (true, true, None) => format!("Target {}", self.id),
        };
        TargetSnapshot {
            id: self.id,
            color: self.color,
            seeded: self.is_seeded(),
            found: self.found,
            region: self.region,
            center: if self.found { self.last_point } else { None },
            state,
            label,
            path: self.points().collect(),
            total_distance: self.total_distance,
            current_speed: self.current_speed,
            average_speed: self.average_speed,
            max_speed: self.max_speed,
        }
    }

    /// One export row per retained path entry.
    pub fn path_rows(&self) -> Vec<PathRow> {
        self.path
            .iter()
            .map(|e| PathRow {
                target_id: self.id,
                frame_index: e.frame_index,
                x: e.point.x,
                y: e.point.y,
                state: e.state,
                cumulative_distance: e.cumulative_distance,
                average_speed: e.average_speed,
                max_speed: e.max_speed,
            })
            .collect()
    }
}

impl fmt::Debug for TargetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetUnit")
            .field("id", &self.id)
            .field("region", &self.region)
            .field("seeded", &self.is_seeded())
            .field("found", &self.found)
            .field("path_len", &self.path.len())
            .field("total_distance", &self.total_distance)
            .finish_non_exhaustive()
    }
}
