//! Multi-target path tracking sessions.
//!
//! A [`Session`](session::Session) follows a fixed set of targets through a
//! stream of frames. Each target owns a pluggable
//! [`TrackingCapability`](tracker::TrackingCapability) and records its path,
//! movement state, travelled distance and speeds. Sessions are driven either
//! one frame per call through the [`SessionRegistry`](session::SessionRegistry)
//! or continuously by a [`FramePump`](pump::FramePump) reading a
//! [`FrameSource`](pump::FrameSource).

pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod pump;
pub mod session;
pub mod tracker;

pub use config::EngineConfig;
pub use error::{RegistryError, SessionError, ValidationError};
pub use frame::Frame;
pub use session::{Report, Session, SessionId, SessionRegistry, SessionRequest, Snapshot};
pub use tracker::{Region, TrackingCapability};
