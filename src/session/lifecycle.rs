//! The tracking session: a fixed set of targets behind one lock, driven frame
//! by frame through its lifecycle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{SessionError, ValidationError};
use crate::export::PathRow;
use crate::frame::Frame;
use crate::session::clock::{Clock, epoch_seconds};
use crate::session::snapshot::{Report, SessionRequest, Snapshot};
use crate::session::state::{SessionId, SessionState};
use crate::tracker::{Kinematics, Region, TargetUnit, TrackerFactory, aggregate};

/// One tracking run over a shared frame stream.
///
/// Every mutating operation holds the session lock for its whole duration, so
/// calls against the same session are serialized while different sessions
/// proceed independently. [`state`](Self::state) and
/// [`frame_count`](Self::frame_count) read lock-free mirrors and may lag a
/// concurrent update.
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    monochrome: bool,
    target_count: usize,
    clock: Arc<dyn Clock>,
    factory: Arc<dyn TrackerFactory>,
    inner: Mutex<SessionInner>,
    state_hint: AtomicU8,
    frame_hint: AtomicU64,
}

struct SessionInner {
    state: SessionState,
    targets: Vec<TargetUnit>,
    frame_count: u64,
    stopped_at: Option<DateTime<Utc>>,
    last_snapshot: Option<Snapshot>,
    report: Option<Report>,
}

impl Session {
    /// Validate `request` and build a session in the `Created` state with one
    /// unseeded target per region.
    pub fn new(
        id: SessionId,
        request: &SessionRequest,
        config: &EngineConfig,
        factory: Arc<dyn TrackerFactory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        request.validate(config.max_targets)?;

        let kinematics = Kinematics {
            max_path_len: config.max_path_len,
            movement_threshold: config.movement_threshold,
            nominal_interval: config.nominal_interval(),
        };
        let targets: Vec<TargetUnit> = request
            .initial_regions
            .iter()
            .zip(1..)
            .map(|(region, id)| TargetUnit::new(id, *region, kinematics))
            .collect();

        Ok(Self {
            id,
            created_at: clock.now(),
            monochrome: request.monochrome,
            target_count: targets.len(),
            clock,
            factory,
            inner: Mutex::new(SessionInner {
                state: SessionState::Created,
                targets,
                frame_count: 0,
                stopped_at: None,
                last_snapshot: None,
                report: None,
            }),
            state_hint: AtomicU8::new(SessionState::Created.to_u8()),
            frame_hint: AtomicU64::new(0),
        })
    }

    /// Feed one frame through the session.
    ///
    /// The first frame seeds every target from its declared region and is then
    /// tracked like any other. While paused the last snapshot is returned
    /// without touching any tracker.
    ///
    /// # Errors
    /// [`SessionError::Initialization`] if any target fails to seed (the session
    /// stays `Created` with no target seeded), [`SessionError::InvalidState`]
    /// once stopped.
    #[tracing::instrument(skip(self, frame), fields(session_id = %self.id))]
    pub fn process_frame(&self, frame: &Frame) -> Result<Snapshot, SessionError> {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Stopped => {
                return Err(SessionError::InvalidState {
                    operation: "process a frame for",
                    state: SessionState::Stopped,
                });
            }
            SessionState::Paused => {
                return Ok(inner
                    .last_snapshot
                    .clone()
                    .unwrap_or_else(|| self.build_snapshot(&inner)));
            }
            SessionState::Created | SessionState::Initializing => {
                self.initialize(&mut inner, frame)?;
            }
            SessionState::Active => {}
        }
        Ok(self.advance_all(&mut inner, frame))
    }

    /// Seed all targets against `frame` as one step: either every target is
    /// seeded or none is.
    fn initialize(&self, inner: &mut SessionInner, frame: &Frame) -> Result<(), SessionError> {
        self.set_state(inner, SessionState::Initializing);
        let now = epoch_seconds(self.clock.now());

        let mut staged: Vec<TargetUnit> = inner.targets.iter().map(TargetUnit::unseeded).collect();
        for target in staged.iter_mut() {
            let region = target.region();
            let tracker = self.factory.create(target.id());
            if let Err(err) = target.seed(tracker, frame, region, now) {
                warn!(target = target.id(), %region, "tracker rejected initial region");
                self.set_state(inner, SessionState::Created);
                return Err(err.into());
            }
        }

        inner.targets = staged;
        self.set_state(inner, SessionState::Active);
        info!(targets = inner.targets.len(), "session initialized");
        Ok(())
    }

    fn advance_all(&self, inner: &mut SessionInner, frame: &Frame) -> Snapshot {
        let now = epoch_seconds(self.clock.now());
        for target in inner.targets.iter_mut() {
            if !target.advance(frame, now).found {
                debug!(target = target.id(), frame = inner.frame_count + 1, "target lost");
            }
        }

        inner.frame_count += 1;
        self.frame_hint.store(inner.frame_count, Ordering::Release);

        let snapshot = self.build_snapshot(inner);
        inner.last_snapshot = Some(snapshot.clone());
        snapshot
    }

    fn build_snapshot(&self, inner: &SessionInner) -> Snapshot {
        Snapshot {
            session_id: self.id.clone(),
            frame_index: inner.frame_count,
            state: inner.state,
            monochrome: self.monochrome,
            targets: inner.targets.iter().map(TargetUnit::snapshot).collect(),
            metrics: aggregate(&inner.targets),
        }
    }

    fn set_state(&self, inner: &mut SessionInner, state: SessionState) {
        inner.state = state;
        self.state_hint.store(state.to_u8(), Ordering::Release);
    }

    /// Stop the session and return its report.
    ///
    /// Idempotent: later calls return the report computed by the first one.
    pub fn stop(&self) -> Report {
        let mut inner = self.inner.lock();
        if let Some(report) = &inner.report {
            return report.clone();
        }

        let stopped_at = self.clock.now();
        let duration = stopped_at - self.created_at;
        let report = Report {
            session_id: self.id.clone(),
            duration_seconds: duration.num_milliseconds() as f64 / 1000.0,
            total_frames: inner.frame_count,
            targets: inner.targets.iter().map(TargetUnit::summary).collect(),
        };

        inner.stopped_at = Some(stopped_at);
        inner.report = Some(report.clone());
        self.set_state(&mut inner, SessionState::Stopped);
        info!(
            session_id = %self.id,
            frames = report.total_frames,
            duration_s = report.duration_seconds,
            "session stopped"
        );
        report
    }

    /// Active to Paused. Frames are answered with the last snapshot until resumed.
    pub fn pause(&self) -> Result<(), SessionError> {
        self.transition("pause", SessionState::Active, SessionState::Paused)
    }

    /// Paused back to Active.
    pub fn resume(&self) -> Result<(), SessionError> {
        self.transition("resume", SessionState::Paused, SessionState::Active)
    }

    fn transition(
        &self,
        operation: &'static str,
        from: SessionState,
        to: SessionState,
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.state != from {
            return Err(SessionError::InvalidState {
                operation,
                state: inner.state,
            });
        }
        self.set_state(&mut inner, to);
        debug!(session_id = %self.id, state = %to, "session state changed");
        Ok(())
    }

    /// Give target `target_id` a fresh tracker locked onto `region` of `frame`.
    ///
    /// Before the first frame this only replaces the declared region. If the
    /// new tracker rejects the region the target keeps its old one.
    pub fn reseed(&self, target_id: u32, region: Region, frame: &Frame) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        if state.is_terminal() {
            return Err(SessionError::InvalidState {
                operation: "reseed",
                state,
            });
        }

        let target = inner
            .targets
            .iter_mut()
            .find(|t| t.id() == target_id)
            .ok_or(SessionError::UnknownTarget(target_id))?;

        if state == SessionState::Created {
            target.set_region(region);
            return Ok(());
        }

        let tracker = self.factory.create(target_id);
        target.seed(tracker, frame, region, epoch_seconds(self.clock.now()))?;
        info!(session_id = %self.id, target = target_id, %region, "target reseeded");
        Ok(())
    }

    /// Drop every target's recorded path and derived speeds.
    pub fn clear_paths(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return Err(SessionError::InvalidState {
                operation: "clear paths of",
                state: inner.state,
            });
        }
        inner.targets.iter_mut().for_each(TargetUnit::clear_path);
        Ok(())
    }

    /// A fresh snapshot of the current state, without processing a frame.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        self.build_snapshot(&inner)
    }

    /// Export rows for every retained path point, target by target.
    pub fn path_rows(&self) -> Vec<PathRow> {
        let inner = self.inner.lock();
        inner.targets.iter().flat_map(TargetUnit::path_rows).collect()
    }

    /// Run `f` against the targets under the session lock.
    pub fn with_targets<R>(&self, f: impl FnOnce(&[TargetUnit]) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.targets)
    }

    /// The final report, once stopped.
    pub fn report(&self) -> Option<Report> {
        self.inner.lock().report.clone()
    }

    /// When the session was stopped, if it has been.
    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().stopped_at
    }

    /// Best-effort state; never blocks on the session lock.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state_hint.load(Ordering::Acquire))
    }

    /// Best-effort processed frame count; never blocks on the session lock.
    pub fn frame_count(&self) -> u64 {
        self.frame_hint.load(Ordering::Acquire)
    }

    /// Identifier assigned by the registry.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Creation time on the registry clock. Drives age-based eviction.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of targets declared at creation.
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Rendering hint from the creation request.
    pub fn monochrome(&self) -> bool {
        self.monochrome
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("frame_count", &self.frame_count())
            .field("target_count", &self.target_count)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::tracker::{MotionState, ScriptedTracker, TrackingCapability};
    use chrono::Duration;

    fn session_with(
        regions: Vec<Region>,
        factory: impl Fn(u32) -> Box<dyn TrackingCapability> + Send + Sync + 'static,
    ) -> (Session, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let session = Session::new(
            SessionId::from("test0001"),
            &SessionRequest::new(regions, false),
            &EngineConfig::default(),
            Arc::new(factory),
            clock.clone(),
        )
        .unwrap();
        (session, clock)
    }

    fn frame() -> Frame {
        Frame::blank(100, 100, 3)
    }

    #[test]
    fn test_first_frame_seeds_and_tracks() {
        let (session, _) = session_with(vec![Region::new(10, 10, 20, 20)], |_| {
            Box::new(ScriptedTracker::drifting(5, 0))
        });
        assert_eq!(session.state(), SessionState::Created);

        let snapshot = session.process_frame(&frame()).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(snapshot.frame_index, 1);
        assert_eq!(snapshot.targets[0].path.len(), 2);
        assert_eq!(snapshot.targets[0].label, "Target 1: Moving");
        assert_eq!(snapshot.metrics.tracked_count, 1);
    }

    #[test]
    fn test_failed_seed_rolls_back() {
        let regions = vec![Region::new(10, 10, 20, 20), Region::new(50, 50, 20, 20)];
        let (session, _) = session_with(regions, |id| -> Box<dyn TrackingCapability> {
            if id == 2 {
                Box::new(ScriptedTracker::rejecting())
            } else {
                Box::new(ScriptedTracker::stationary())
            }
        });

        let err = session.process_frame(&frame()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Initialization(crate::error::InitError::CapabilityRejected { target: 2, .. })
        ));
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.frame_count(), 0);
        session.with_targets(|targets| {
            assert!(targets.iter().all(|t| !t.is_seeded() && t.path().is_empty()));
        });
    }

    #[test]
    fn test_pause_returns_last_snapshot() {
        let (session, clock) = session_with(vec![Region::new(10, 10, 20, 20)], |_| {
            Box::new(ScriptedTracker::drifting(5, 0))
        });
        let first = session.process_frame(&frame()).unwrap();

        session.pause().unwrap();
        clock.advance(Duration::seconds(1));
        let paused = session.process_frame(&frame()).unwrap();
        assert_eq!(paused, first);
        assert_eq!(session.frame_count(), 1);

        session.resume().unwrap();
        let resumed = session.process_frame(&frame()).unwrap();
        assert_eq!(resumed.frame_index, 2);
        assert_eq!(resumed.targets[0].total_distance, 10.0);
    }

    #[test]
    fn test_invalid_transitions() {
        let (session, _) = session_with(vec![Region::new(10, 10, 20, 20)], |_| {
            Box::new(ScriptedTracker::stationary())
        });
        assert!(matches!(
            session.pause(),
            Err(SessionError::InvalidState { state: SessionState::Created, .. })
        ));
        session.process_frame(&frame()).unwrap();
        assert!(session.resume().is_err());

        session.stop();
        assert!(matches!(
            session.process_frame(&frame()),
            Err(SessionError::InvalidState { state: SessionState::Stopped, .. })
        ));
        assert!(session.clear_paths().is_err());
    }

    #[test]
    fn test_stop_reports_duration() {
        let (session, clock) = session_with(vec![Region::new(10, 10, 20, 20)], |_| {
            Box::new(ScriptedTracker::drifting(5, 0))
        });
        session.process_frame(&frame()).unwrap();
        clock.advance(Duration::milliseconds(2500));

        let report = session.stop();
        assert_eq!(report.duration_seconds, 2.5);
        assert_eq!(report.total_frames, 1);
        assert_eq!(report.targets[0].point_count, 2);
        assert_eq!(session.stopped_at(), Some(clock.now()));
    }

    #[test]
    fn test_reseed() {
        let (session, _) = session_with(vec![Region::new(10, 10, 20, 20)], |_| {
            Box::new(ScriptedTracker::stationary())
        });

        // before the first frame only the declared region changes
        session.reseed(1, Region::new(40, 40, 20, 20), &frame()).unwrap();
        let snapshot = session.process_frame(&frame()).unwrap();
        assert_eq!(snapshot.targets[0].path[0], crate::tracker::Point::new(50, 50));

        session.reseed(1, Region::new(70, 40, 20, 20), &frame()).unwrap();
        session.with_targets(|targets| {
            let target = &targets[0];
            assert_eq!(target.path().len(), 3);
            assert_eq!(target.path()[2].state, MotionState::Moving);
            assert_eq!(target.total_distance(), 0.0);
        });

        assert_eq!(
            session.reseed(7, Region::new(0, 0, 5, 5), &frame()),
            Err(SessionError::UnknownTarget(7))
        );
    }

    #[test]
    fn test_clear_paths() {
        let (session, _) = session_with(vec![Region::new(10, 10, 20, 20)], |_| {
            Box::new(ScriptedTracker::drifting(5, 0))
        });
        session.process_frame(&frame()).unwrap();
        session.clear_paths().unwrap();

        let snapshot = session.snapshot();
        assert!(snapshot.targets[0].path.is_empty());
        assert_eq!(snapshot.metrics.total_distance, 0.0);
    }
}
