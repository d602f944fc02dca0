//! Background worker driving a session from a frame source.
//!
//! The worker thread is the only place that touches the session's trackers
//! while it runs. Controllers talk to it through a command queue and read
//! back immutable [`Published`] copies of the latest frame and snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::{PumpError, SessionError};
use crate::frame::Frame;
use crate::pump::source::{FrameSource, SourceKind};
use crate::session::{Session, SessionState, Snapshot};
use crate::tracker::Region;

/// Intent sent from a controller to the worker. Applied at the top of the
/// next iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpCommand {
    Pause,
    Resume,
    /// Give target `target_id` a new tracker on `region` of the current frame.
    Reseed { target_id: u32, region: Region },
    ClearPaths,
}

/// Why the worker stopped, or what needs the controller's attention.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    /// A file-backed source has no more frames. The session is left running
    /// for the controller to stop and export.
    EndOfStream,
    /// The source failed or a live source stopped producing frames. The
    /// session is not finalized.
    SourceLost { reason: String },
    /// The first frame could not seed every target. The pump pauses and keeps
    /// showing that frame until targets are reseeded and it is resumed.
    InitializationFailed { reason: String },
    /// The session was stopped from outside the pump.
    SessionStopped,
}

/// A frame and the session state after processing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub frame: Frame,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PumpOptions {
    /// Show the first frame without tracking it until resumed.
    pub start_paused: bool,
    /// How long [`FramePump::shutdown`] waits for the worker.
    pub shutdown_timeout: Duration,
    /// Pacing rate when the source reports none.
    pub fallback_fps: f64,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            start_paused: false,
            shutdown_timeout: Duration::from_millis(1000),
            fallback_fps: 30.0,
        }
    }
}

impl PumpOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            shutdown_timeout: config.shutdown_timeout(),
            fallback_fps: config.nominal_fps,
            ..Self::default()
        }
    }
}

/// Pacing used when neither the source nor the options give a usable rate.
const DEFAULT_INTERVAL: Duration = Duration::from_nanos(33_333_333);

/// Longest pause between two reads. Slower rates are clamped to it so the
/// worker still notices a stop request.
const MAX_INTERVAL: Duration = Duration::from_secs(10);

fn usable_interval(fps: f64) -> Option<Duration> {
    if !(fps.is_finite() && fps > 0.0) {
        return None;
    }
    let interval = Duration::try_from_secs_f64(1.0 / fps).ok()?;
    Some(interval.min(MAX_INTERVAL))
}

/// Time between reads for a source reporting `nominal` frames per second.
fn frame_interval(nominal: Option<f64>, fallback_fps: f64) -> Duration {
    nominal
        .and_then(usable_interval)
        .or_else(|| usable_interval(fallback_fps))
        .unwrap_or(DEFAULT_INTERVAL)
}

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// Handle to a running pump.
///
/// Dropping the handle asks the worker to stop but does not wait for it;
/// use [`shutdown`](Self::shutdown) for a bounded wait.
pub struct FramePump {
    session: Arc<Session>,
    source: SharedSource,
    commands: Sender<PumpCommand>,
    events: Receiver<PumpEvent>,
    latest: Arc<RwLock<Option<Arc<Published>>>>,
    stop: Arc<AtomicBool>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl FramePump {
    /// Start a worker thread pumping `source` into `session`.
    pub fn spawn(
        session: Arc<Session>,
        source: Box<dyn FrameSource>,
        options: PumpOptions,
    ) -> Result<Self, PumpError> {
        let interval = frame_interval(source.nominal_rate(), options.fallback_fps);

        let source: SharedSource = Arc::new(Mutex::new(source));
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let latest = Arc::new(RwLock::new(None));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            session: Arc::clone(&session),
            source: Arc::clone(&source),
            commands: command_rx,
            events: event_tx,
            latest: Arc::clone(&latest),
            stop: Arc::clone(&stop),
            interval,
            paused: options.start_paused,
            last_frame: None,
            pending_reseeds: Vec::new(),
        };

        let handle = thread::Builder::new()
            .name(format!("frame-pump-{}", session.id()))
            .spawn(move || worker.run(done_tx))
            .map_err(PumpError::Spawn)?;

        info!(
            session_id = %session.id(),
            interval_ms = interval.as_millis() as u64,
            "frame pump started"
        );
        Ok(Self {
            session,
            source,
            commands: command_tx,
            events: event_rx,
            latest,
            stop,
            done: done_rx,
            handle: Some(handle),
            shutdown_timeout: options.shutdown_timeout,
        })
    }

    pub fn pause(&self) -> Result<(), PumpError> {
        self.send(PumpCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), PumpError> {
        self.send(PumpCommand::Resume)
    }

    pub fn reseed(&self, target_id: u32, region: Region) -> Result<(), PumpError> {
        self.send(PumpCommand::Reseed { target_id, region })
    }

    pub fn clear_paths(&self) -> Result<(), PumpError> {
        self.send(PumpCommand::ClearPaths)
    }

    pub fn send(&self, command: PumpCommand) -> Result<(), PumpError> {
        self.commands
            .send(command)
            .map_err(|_| PumpError::WorkerGone)
    }

    /// The most recently published frame and snapshot.
    pub fn latest(&self) -> Option<Arc<Published>> {
        self.latest.read().clone()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<PumpEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    pub fn try_event(&self) -> Option<PumpEvent> {
        self.events.try_recv().ok()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Stop the worker and release the source.
    ///
    /// Waits at most the configured shutdown timeout for the worker to
    /// notice. Returns `false` if it did not. The source is then released
    /// here if the worker is between reads, or by the worker as soon as its
    /// pending read returns.
    pub fn shutdown(mut self) -> bool {
        self.stop.store(true, Ordering::Release);

        let exited = match self.done.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };

        if exited {
            if let Some(handle) = self.handle.take() {
                if handle.join().is_err() {
                    warn!(session_id = %self.session.id(), "frame pump worker panicked");
                }
            }
            self.source.lock().release();
        } else {
            warn!(
                session_id = %self.session.id(),
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "frame pump did not stop in time, releasing source"
            );
            match self.source.try_lock_for(Duration::from_millis(50)) {
                Some(mut source) => source.release(),
                None => warn!(
                    session_id = %self.session.id(),
                    "frame source is busy, worker releases it after the pending read"
                ),
            }
        }

        info!(session_id = %self.session.id(), exited, "frame pump stopped");
        exited
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

struct Worker {
    session: Arc<Session>,
    source: SharedSource,
    commands: Receiver<PumpCommand>,
    events: Sender<PumpEvent>,
    latest: Arc<RwLock<Option<Arc<Published>>>>,
    stop: Arc<AtomicBool>,
    interval: Duration,
    paused: bool,
    last_frame: Option<Frame>,
    pending_reseeds: Vec<(u32, Region)>,
}

enum Step {
    Continue(Snapshot),
    Exit(Option<PumpEvent>),
}

impl Worker {
    fn run(mut self, done: SyncSender<()>) {
        while !self.stop.load(Ordering::Acquire) {
            let started = Instant::now();

            self.drain_commands();
            self.apply_reseeds();

            match self.step() {
                Step::Continue(snapshot) => self.publish(snapshot),
                Step::Exit(event) => {
                    if let Some(event) = event {
                        // the controller may already be gone
                        let _ = self.events.send(event);
                    }
                    break;
                }
            }

            if let Some(remaining) = self.interval.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }

        if self.stop.load(Ordering::Acquire) {
            self.source.lock().release();
        }
        debug!(session_id = %self.session.id(), "frame pump worker exiting");
        let _ = done.send(());
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            trace!(session_id = %self.session.id(), ?command, "pump command");
            let result = match command {
                PumpCommand::Pause => {
                    self.paused = true;
                    self.session.pause()
                }
                PumpCommand::Resume => {
                    self.paused = false;
                    self.session.resume()
                }
                PumpCommand::Reseed { target_id, region } => {
                    self.pending_reseeds.push((target_id, region));
                    Ok(())
                }
                PumpCommand::ClearPaths => self.session.clear_paths(),
            };
            // pausing before the first tracked frame only affects the pump
            if let Err(e) = result {
                debug!(session_id = %self.session.id(), error = %e, "command not applied to session");
            }
        }
    }

    fn apply_reseeds(&mut self) {
        let Some(frame) = &self.last_frame else {
            return;
        };
        for (target_id, region) in self.pending_reseeds.drain(..) {
            if let Err(e) = self.session.reseed(target_id, region, frame) {
                warn!(
                    session_id = %self.session.id(),
                    target = target_id,
                    %region,
                    error = %e,
                    "reseed rejected"
                );
            }
        }
    }

    fn step(&mut self) -> Step {
        if self.paused && self.last_frame.is_some() {
            let snapshot = self.session.snapshot();
            if snapshot.state == SessionState::Stopped {
                return Step::Exit(Some(PumpEvent::SessionStopped));
            }
            return Step::Continue(snapshot);
        }

        let (read, kind) = {
            let mut source = self.source.lock();
            (source.read(), source.kind())
        };
        // a read that outlived a shutdown must not reach the session
        if self.stop.load(Ordering::Acquire) {
            return Step::Exit(None);
        }
        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(session_id = %self.session.id(), "frame source exhausted");
                return Step::Exit(Some(match kind {
                    SourceKind::File => PumpEvent::EndOfStream,
                    SourceKind::Live => PumpEvent::SourceLost {
                        reason: "stream ended".to_owned(),
                    },
                }));
            }
            Err(e) => {
                warn!(session_id = %self.session.id(), error = %e, "frame source failed");
                return Step::Exit(Some(PumpEvent::SourceLost {
                    reason: e.to_string(),
                }));
            }
        };

        let snapshot = if self.paused {
            Ok(self.session.snapshot())
        } else {
            self.session.process_frame(&frame)
        };
        self.last_frame = Some(frame);

        match snapshot {
            Ok(snapshot) => Step::Continue(snapshot),
            Err(SessionError::Initialization(e)) => {
                self.paused = true;
                let _ = self.events.send(PumpEvent::InitializationFailed {
                    reason: e.to_string(),
                });
                Step::Continue(self.session.snapshot())
            }
            Err(e) => {
                debug!(session_id = %self.session.id(), error = %e, "session no longer accepts frames");
                Step::Exit(Some(PumpEvent::SessionStopped))
            }
        }
    }

    fn publish(&self, snapshot: Snapshot) {
        let Some(frame) = &self.last_frame else {
            return;
        };
        trace!(session_id = %self.session.id(), frame = snapshot.frame_index, "publishing");
        let published = Published {
            frame: frame.clone(),
            snapshot,
        };
        *self.latest.write() = Some(Arc::new(published));
    }
}
