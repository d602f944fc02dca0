//! Process-wide table of sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::TimeDelta;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{ConfigError, RegistryError, SessionError, ValidationError};
use crate::export::{ExportSink, NullExporter, sweep_stale_artifacts};
use crate::frame::Frame;
use crate::session::clock::{Clock, SystemClock};
use crate::session::lifecycle::Session;
use crate::session::snapshot::{Report, SessionListing, SessionRequest, Snapshot};
use crate::session::state::{SessionId, SessionState};
use crate::tracker::TrackerFactory;

#[derive(Default)]
struct Partitions {
    active: HashMap<SessionId, Arc<Session>>,
    archived: HashMap<SessionId, Arc<Session>>,
}

impl Partitions {
    fn get(&self, id: &SessionId) -> Option<&Arc<Session>> {
        self.active.get(id).or_else(|| self.archived.get(id))
    }

    fn contains(&self, id: &SessionId) -> bool {
        self.active.contains_key(id) || self.archived.contains_key(id)
    }
}

/// Session counts per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryHealth {
    pub active: usize,
    pub archived: usize,
    pub total: usize,
}

/// What a [`SessionRegistry::cleanup`] pass removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub evicted: Vec<SessionId>,
    pub stale_artifacts: usize,
}

/// Owns every session of the process, split into an active partition and an
/// archive of stopped sessions.
///
/// The partition map has its own lock: lookups hand out an `Arc<Session>` and
/// release it before any session work starts, so a slow frame on one session
/// never blocks access to another.
pub struct SessionRegistry {
    config: EngineConfig,
    factory: Arc<dyn TrackerFactory>,
    clock: Arc<dyn Clock>,
    exporter: Arc<dyn ExportSink>,
    partitions: RwLock<Partitions>,
}

impl SessionRegistry {
    /// Registry on the system clock that exports nothing.
    ///
    /// # Errors
    /// [`ConfigError`] if `config` fails [`EngineConfig::validate`].
    pub fn new(config: EngineConfig, factory: Arc<dyn TrackerFactory>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            clock: Arc::new(SystemClock),
            exporter: Arc::new(NullExporter),
            partitions: RwLock::new(Partitions::default()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn ExportSink>) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Allocate a session in the `Created` state.
    ///
    /// # Errors
    /// [`ValidationError`] if the target count is outside `1..=9` or does not
    /// match the number of regions. Nothing is allocated in that case.
    #[tracing::instrument(skip(self, request), fields(targets = request.target_count))]
    pub fn create(&self, request: &SessionRequest) -> Result<SessionId, ValidationError> {
        request.validate(self.config.max_targets)?;

        let mut partitions = self.partitions.write();
        let mut id = SessionId::generate();
        while partitions.contains(&id) {
            id = SessionId::generate();
        }

        let session = Session::new(
            id.clone(),
            request,
            &self.config,
            Arc::clone(&self.factory),
            Arc::clone(&self.clock),
        )?;
        partitions.active.insert(id.clone(), Arc::new(session));
        info!(session_id = %id, targets = request.target_count, "session created");
        Ok(id)
    }

    /// Find a session in either partition.
    pub fn lookup(&self, id: &SessionId) -> Result<Arc<Session>, RegistryError> {
        self.partitions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    pub fn process_frame(&self, id: &SessionId, frame: &Frame) -> Result<Snapshot, RegistryError> {
        let session = self.lookup(id)?;
        Ok(session.process_frame(frame)?)
    }

    /// Move a stopped session from the active partition to the archive.
    /// Archived sessions are left where they are.
    pub fn remove_from_active(&self, id: &SessionId) -> Result<(), RegistryError> {
        let mut partitions = self.partitions.write();
        let Some(session) = partitions.active.get(id) else {
            return if partitions.archived.contains_key(id) {
                Ok(())
            } else {
                Err(RegistryError::NotFound(id.clone()))
            };
        };

        let state = session.state();
        if state != SessionState::Stopped {
            return Err(SessionError::InvalidState {
                operation: "archive",
                state,
            }
            .into());
        }
        if let Some(session) = partitions.active.remove(id) {
            partitions.archived.insert(id.clone(), session);
        }
        Ok(())
    }

    /// Stop a session, export it and archive it.
    ///
    /// Repeated calls return the same report; export only happens on the
    /// call that moves the session out of the active partition. A failed
    /// export is logged and does not fail the stop.
    pub fn stop(&self, id: &SessionId) -> Result<Report, RegistryError> {
        let session = self.lookup(id)?;
        let report = session.stop();

        let was_active = {
            let mut partitions = self.partitions.write();
            match partitions.active.remove(id) {
                Some(session) => {
                    partitions.archived.insert(id.clone(), session);
                    true
                }
                None => false,
            }
        };

        if was_active {
            let rows = session.path_rows();
            if let Err(e) = self.exporter.export(&report, &rows) {
                warn!(session_id = %id, error = %e, "failed to export session");
            }
        }
        Ok(report)
    }

    /// Remove every session created more than `max_age_hours` ago and discard
    /// its exported data. Returns the evicted ids.
    ///
    /// A negative or non-finite age evicts nothing, as does an age reaching
    /// back before the earliest representable time.
    pub fn evict_expired(&self, max_age_hours: f64) -> Vec<SessionId> {
        if !(max_age_hours.is_finite() && max_age_hours >= 0.0) {
            warn!(max_age_hours, "ignoring invalid session age threshold");
            return Vec::new();
        }
        let cutoff = TimeDelta::try_milliseconds((max_age_hours * 3_600_000.0) as i64)
            .and_then(|max_age| self.clock.now().checked_sub_signed(max_age));
        let Some(cutoff) = cutoff else {
            debug!(max_age_hours, "age threshold predates every session");
            return Vec::new();
        };

        let evicted: Vec<SessionId> = {
            let mut partitions = self.partitions.write();
            let Partitions { active, archived } = &mut *partitions;
            let mut evicted = Vec::new();
            for partition in [active, archived] {
                partition.retain(|id, session| {
                    let expired = session.created_at() < cutoff;
                    if expired {
                        evicted.push(id.clone());
                    }
                    !expired
                });
            }
            evicted
        };

        for id in &evicted {
            if let Err(e) = self.exporter.discard(id) {
                warn!(session_id = %id, error = %e, "failed to discard session data");
            }
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), max_age_hours, "expired sessions evicted");
        }
        evicted
    }

    /// Evict sessions older than the configured age and sweep stale
    /// temporary frame artifacts.
    pub fn cleanup(&self) -> Result<CleanupSummary, RegistryError> {
        let evicted = self.evict_expired(self.config.session_max_age_hours);
        let stale_artifacts = match &self.config.temp_dir {
            Some(dir) => sweep_stale_artifacts(dir, self.config.temp_max_age())?,
            None => 0,
        };
        Ok(CleanupSummary {
            evicted,
            stale_artifacts,
        })
    }

    /// Listing of every known session, oldest first.
    ///
    /// Frame counts and states are read without taking session locks and may
    /// trail an in-flight frame.
    pub fn list(&self) -> Vec<SessionListing> {
        let sessions: Vec<(Arc<Session>, bool)> = {
            let partitions = self.partitions.read();
            partitions
                .active
                .values()
                .map(|s| (Arc::clone(s), true))
                .chain(partitions.archived.values().map(|s| (Arc::clone(s), false)))
                .collect()
        };

        let mut listings: Vec<SessionListing> = sessions
            .into_iter()
            .map(|(session, in_active)| {
                let state = session.state();
                SessionListing {
                    id: session.id().clone(),
                    target_count: session.target_count(),
                    created_at: session.created_at(),
                    frame_count: session.frame_count(),
                    is_active: in_active && !state.is_terminal(),
                    has_results: state.is_terminal(),
                }
            })
            .collect();
        listings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        listings
    }

    pub fn health(&self) -> RegistryHealth {
        let partitions = self.partitions.read();
        let active = partitions.active.len();
        let archived = partitions.archived.len();
        RegistryHealth {
            active,
            archived,
            total: active + archived,
        }
    }
}
