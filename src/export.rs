//! Persistence of finished sessions.
//!
//! A stopped session is handed to an [`ExportSink`] as its [`Report`] plus one
//! [`PathRow`] per retained path point. [`DirectoryExporter`] lays them out as
//!
//! ```text
//! <root>/session_<id>/report.json
//! <root>/session_<id>/tracking_data.csv
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::session::{Report, SessionId};
use crate::tracker::MotionState;

/// One tabular export row: a path point with the kinematics recorded when it
/// was taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathRow {
    pub target_id: u32,
    pub frame_index: u64,
    pub x: i32,
    pub y: i32,
    pub state: MotionState,
    pub cumulative_distance: f64,
    pub average_speed: f64,
    pub max_speed: f64,
}

/// Destination for finished sessions.
pub trait ExportSink: Send + Sync {
    /// Persist a stopped session.
    fn export(&self, report: &Report, rows: &[PathRow]) -> Result<(), ExportError>;

    /// Delete whatever was persisted for `id`. Unknown ids are not an error.
    fn discard(&self, id: &SessionId) -> Result<(), ExportError>;
}

/// Sink that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExporter;

impl ExportSink for NullExporter {
    fn export(&self, _report: &Report, _rows: &[PathRow]) -> Result<(), ExportError> {
        Ok(())
    }

    fn discard(&self, _id: &SessionId) -> Result<(), ExportError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    root: PathBuf,
}

impl DirectoryExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of session `id`.
    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(format!("session_{id}"))
    }
}

impl ExportSink for DirectoryExporter {
    fn export(&self, report: &Report, rows: &[PathRow]) -> Result<(), ExportError> {
        let dir = self.session_dir(&report.session_id);
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(report)?;
        fs::write(dir.join("report.json"), json)?;

        let mut writer = csv::Writer::from_path(dir.join("tracking_data.csv"))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        info!(
            session_id = %report.session_id,
            rows = rows.len(),
            dir = %dir.display(),
            "session exported"
        );
        Ok(())
    }

    fn discard(&self, id: &SessionId) -> Result<(), ExportError> {
        let dir = self.session_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(session_id = %id, "session artifacts removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Delete regular files directly inside `dir` last modified more than
/// `max_age` ago, returning how many were removed. A missing directory counts
/// as empty.
pub fn sweep_stale_artifacts(dir: &Path, max_age: Duration) -> Result<usize, ExportError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let age = now
            .duration_since(metadata.modified()?)
            .unwrap_or(Duration::ZERO);
        if age > max_age {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    if removed > 0 {
        info!(dir = %dir.display(), removed, "stale frame artifacts removed");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TargetSummary;
    use tempfile::tempdir;

    fn report() -> Report {
        Report {
            session_id: SessionId::from("feedbeef"),
            duration_seconds: 2.0,
            total_frames: 1,
            targets: vec![TargetSummary {
                id: 1,
                point_count: 2,
                total_distance: 5.0,
                average_speed: 5.0,
                max_speed: 5.0,
            }],
        }
    }

    fn rows() -> Vec<PathRow> {
        vec![
            PathRow {
                target_id: 1,
                frame_index: 0,
                x: 20,
                y: 20,
                state: MotionState::Moving,
                cumulative_distance: 0.0,
                average_speed: 0.0,
                max_speed: 0.0,
            },
            PathRow {
                target_id: 1,
                frame_index: 1,
                x: 25,
                y: 20,
                state: MotionState::Moving,
                cumulative_distance: 5.0,
                average_speed: 5.0,
                max_speed: 5.0,
            },
        ]
    }

    #[test]
    fn test_directory_export_layout() {
        let root = tempdir().unwrap();
        let exporter = DirectoryExporter::new(root.path());
        exporter.export(&report(), &rows()).unwrap();

        let dir = root.path().join("session_feedbeef");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("report.json")).unwrap()).unwrap();
        assert_eq!(json["totalFrames"], 1);

        let csv = fs::read_to_string(dir.join("tracking_data.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("target_id,frame_index,x,y,state,cumulative_distance,average_speed,max_speed")
        );
        assert_eq!(lines.next(), Some("1,0,20,20,Moving,0.0,0.0,0.0"));
        assert_eq!(lines.next(), Some("1,1,25,20,Moving,5.0,5.0,5.0"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_discard_removes_session_dir() {
        let root = tempdir().unwrap();
        let exporter = DirectoryExporter::new(root.path());
        exporter.export(&report(), &rows()).unwrap();

        let id = SessionId::from("feedbeef");
        exporter.discard(&id).unwrap();
        assert!(!exporter.session_dir(&id).exists());
        // second discard finds nothing and still succeeds
        exporter.discard(&id).unwrap();
    }

    #[test]
    fn test_sweep_keeps_fresh_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("frame_0001.jpg"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(sweep_stale_artifacts(dir.path(), Duration::from_secs(3600)).unwrap(), 0);
        assert!(dir.path().join("frame_0001.jpg").exists());

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sweep_stale_artifacts(dir.path(), Duration::from_millis(1)).unwrap(), 1);
        assert!(!dir.path().join("frame_0001.jpg").exists());
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_sweep_missing_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(
            sweep_stale_artifacts(&dir.path().join("absent"), Duration::ZERO).unwrap(),
            0
        );
    }
}
