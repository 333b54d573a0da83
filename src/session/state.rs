use std::path::{Path, PathBuf};

/// Snapshot bound to a session: id, device path and link exist together or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSnapshot {
    pub snapshot_id: String,
    pub device_path: String,
    pub link_path: PathBuf,
    /// Volume root the snapshot was taken of (`C:\`, `/`).
    pub volume_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unbound,
    Bound(BoundSnapshot),
}

impl SessionState {
    pub fn bound(&self) -> Option<&BoundSnapshot> {
        match self {
            SessionState::Unbound => None,
            SessionState::Bound(b) => Some(b),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, SessionState::Bound(_))
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.bound().map(|b| b.snapshot_id.as_str())
    }

    pub fn device_path(&self) -> Option<&str> {
        self.bound().map(|b| b.device_path.as_str())
    }

    pub fn link_path(&self) -> Option<&Path> {
        self.bound().map(|b| b.link_path.as_path())
    }
}
