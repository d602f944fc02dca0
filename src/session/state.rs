use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Eight hex characters taken from a random v4 UUID.
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle.
///
/// ```text
/// Created ──first frame──▶ Initializing ──all seeded──▶ Active ◀──▶ Paused
///    ▲                          │                         │           │
///    └──────any seed fails──────┘                         └──stop──▶ Stopped
/// ```
///
/// `Initializing` only exists while the first frame is being handled under
/// the session lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Created,
    Initializing,
    Active,
    Paused,
    Stopped,
}

impl SessionState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            SessionState::Created => 0,
            SessionState::Initializing => 1,
            SessionState::Active => 2,
            SessionState::Paused => 3,
            SessionState::Stopped => 4,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionState::Initializing,
            2 => SessionState::Active,
            3 => SessionState::Paused,
            4 => SessionState::Stopped,
            _ => SessionState::Created,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Stopped
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "Created",
            SessionState::Initializing => "Initializing",
            SessionState::Active => "Active",
            SessionState::Paused => "Paused",
            SessionState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}
