//! Deterministic tracking capability for tests and replays.

use std::collections::VecDeque;

use crate::frame::Frame;
use crate::tracker::capability::TrackingCapability;
use crate::tracker::rect::Region;

/// A tracker that ignores pixels and follows a script.
///
/// Each `advance` first consumes the scripted outcomes (`None` means the
/// target is lost on that frame); once the script is exhausted the box drifts
/// by a fixed step per frame.
#[derive(Debug, Clone)]
pub struct ScriptedTracker {
    accept: bool,
    step: (i32, i32),
    script: VecDeque<Option<Region>>,
    current: Region,
}

impl ScriptedTracker {
    /// Moves the box by `(dx, dy)` every frame.
    pub fn drifting(dx: i32, dy: i32) -> Self {
        Self {
            accept: true,
            step: (dx, dy),
            script: VecDeque::new(),
            current: Region::default(),
        }
    }

    /// Always reports the seeded box.
    pub fn stationary() -> Self {
        Self::drifting(0, 0)
    }

    /// Replays `outcomes`, then stays where the script left it.
    pub fn scripted(outcomes: Vec<Option<Region>>) -> Self {
        Self {
            script: outcomes.into(),
            ..Self::stationary()
        }
    }

    /// Refuses every initial region.
    pub fn rejecting() -> Self {
        Self {
            accept: false,
            ..Self::stationary()
        }
    }
}

impl TrackingCapability for ScriptedTracker {
    fn initialize(&mut self, _frame: &Frame, region: Region) -> bool {
        if self.accept {
            self.current = region;
        }
        self.accept
    }

    fn advance(&mut self, _frame: &Frame) -> (bool, Region) {
        match self.script.pop_front() {
            Some(Some(region)) => {
                self.current = region;
                (true, region)
            }
            Some(None) => (false, self.current),
            None => match self.current.translate(self.step.0, self.step.1) {
                Some(region) => {
                    self.current = region;
                    (true, region)
                }
                // drifted off the coordinate range
                None => (false, self.current),
            },
        }
    }
}
