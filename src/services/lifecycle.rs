// src/services/lifecycle.rs
use serde::Serialize;
use std::fmt;

/// Where the edge worker is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, install not yet attempted
    #[default]
    Parsed,
    Installing,
    /// Precache complete, waiting to activate
    Installed,
    Activating,
    /// Intercepting requests
    Activated,
    /// Install failed; only a fresh install can activate it
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }

    pub fn can_install(&self) -> bool {
        matches!(self, WorkerState::Parsed | WorkerState::Redundant)
    }

    pub fn can_activate(&self) -> bool {
        matches!(self, WorkerState::Installed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
