mod capability;
mod metrics;
mod motion_state;
mod rect;
mod scripted;
mod target;
mod template;

pub use capability::{TrackerFactory, TrackingCapability};
pub use metrics::{AggregateMetrics, aggregate};
pub use motion_state::{MOVEMENT_THRESHOLD, MotionState};
pub use rect::{Point, Region};
pub use scripted::ScriptedTracker;
pub use target::{Color, Kinematics, Outcome, PathEntry, TARGET_PALETTE, TargetUnit};
pub use template::{TemplateConfig, TemplateTracker};
