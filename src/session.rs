mod clock;
mod lifecycle;
mod registry;
mod snapshot;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lifecycle::Session;
pub use registry::{CleanupSummary, RegistryHealth, SessionRegistry};
pub use snapshot::{
    Report, SessionListing, SessionRequest, Snapshot, TargetSnapshot, TargetSummary,
};
pub use state::{SessionId, SessionState};
