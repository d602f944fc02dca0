//! Error types for the tracking engine.
//!
//! ```text
//! RegistryError
//! ├── ValidationError   (malformed creation request, nothing allocated)
//! ├── NotFound          (unknown or evicted session id)
//! ├── SessionError
//! │   ├── Initialization(InitError)  (a target failed to seed, session stays Created)
//! │   ├── InvalidState               (operation not allowed in the current state)
//! │   └── UnknownTarget
//! └── ExportError
//! ```
//!
//! Losing a target on a single frame is not an error: it shows up as the
//! `found` flag of that target's snapshot.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::{SessionId, SessionState};
use crate::tracker::Region;

/// A session creation request was rejected before anything was allocated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("target count {count} is outside 1..={max}")]
    TargetCount { count: usize, max: usize },

    #[error("expected {expected} initial regions, got {got}")]
    RegionCount { expected: usize, got: usize },
}

/// A tracking capability refused its initial region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("tracker for target {target} rejected region {region}")]
    CapabilityRejected { target: u32, region: Region },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("initialization failed: {0}")]
    Initialization(#[from] InitError),

    #[error("cannot {operation} a session in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("session has no target with id {0}")]
    UnknownTarget(u32),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("pixel buffer of {len} bytes does not match {width}x{height}x{channels}")]
    Shape {
        width: usize,
        height: usize,
        channels: usize,
        len: usize,
    },
}

/// Failures of a frame source. The frame pump halts on any of these.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("source disconnected")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors produced when loading or validating an
/// [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Cannot read config file `{path}`: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PumpError {
    #[error("failed to spawn frame pump: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("frame pump is no longer running")]
    WorkerGone,
}
