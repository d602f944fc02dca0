//! Trait for the visual tracking backends that follow a single target.

use crate::frame::Frame;
use crate::tracker::rect::Region;

/// A single-object visual tracker.
///
/// Implement this trait to connect any bounding-box tracker to a session.
/// An instance follows exactly one target and is owned by exactly one
/// [`TargetUnit`](crate::tracker::TargetUnit); it is never called from two
/// threads at once, so implementations need not be reentrant.
///
/// # Example
///
/// ```ignore
/// use pathtrack_rs::{Frame, Region, TrackingCapability};
///
/// struct MyTracker {
///     // Your model here
/// }
///
/// impl TrackingCapability for MyTracker {
///     fn initialize(&mut self, frame: &Frame, region: Region) -> bool {
///         true
///     }
///
///     fn advance(&mut self, frame: &Frame) -> (bool, Region) {
///         (false, Region::default())
///     }
/// }
/// ```
pub trait TrackingCapability: Send {
    /// Lock onto the object inside `region` of `frame`.
    ///
    /// # Returns
    /// `false` if the tracker cannot use the region (e.g. it is degenerate).
    fn initialize(&mut self, frame: &Frame, region: Region) -> bool;

    /// Locate the object in the next frame.
    ///
    /// # Returns
    /// `(found, region)`. When `found` is `false` the region is meaningless and
    /// the caller keeps its previous state; the tracker may lose its object at
    /// any time.
    fn advance(&mut self, frame: &Frame) -> (bool, Region);
}

/// Creates a fresh tracking capability whenever a target is seeded or reseeded.
///
/// Implemented for any `Fn(u32) -> Box<dyn TrackingCapability>` closure, which
/// receives the 1-based id of the target being seeded.
pub trait TrackerFactory: Send + Sync {
    fn create(&self, target_id: u32) -> Box<dyn TrackingCapability>;
}

impl<F> TrackerFactory for F
where
    F: Fn(u32) -> Box<dyn TrackingCapability> + Send + Sync,
{
    fn create(&self, target_id: u32) -> Box<dyn TrackingCapability> {
        self(target_id)
    }
}
