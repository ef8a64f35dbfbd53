use serde::{Deserialize, Serialize};
use std::fmt;

/// Named slot in the schedule.
///
/// The first three run once when the runtime starts and the last runs once
/// when it stops; the five in between repeat every frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    PreStartup,
    Startup,
    PostStartup,
    First,
    PreUpdate,
    Update,
    PostUpdate,
    Last,
    Shutdown,
}

/// When a stage runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    Startup,
    Frame,
    Shutdown,
}

impl Stage {
    pub const COUNT: usize = 9;

    pub const ALL: [Stage; Self::COUNT] = [
        Stage::PreStartup,
        Stage::Startup,
        Stage::PostStartup,
        Stage::First,
        Stage::PreUpdate,
        Stage::Update,
        Stage::PostUpdate,
        Stage::Last,
        Stage::Shutdown,
    ];

    pub const STARTUP: [Stage; 3] = [Stage::PreStartup, Stage::Startup, Stage::PostStartup];

    pub const FRAME: [Stage; 5] = [
        Stage::First,
        Stage::PreUpdate,
        Stage::Update,
        Stage::PostUpdate,
        Stage::Last,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn phase(self) -> Phase {
        match self {
            Stage::PreStartup | Stage::Startup | Stage::PostStartup => Phase::Startup,
            Stage::First | Stage::PreUpdate | Stage::Update | Stage::PostUpdate | Stage::Last => {
                Phase::Frame
            }
            Stage::Shutdown => Phase::Shutdown,
        }
    }

    /// Whether systems in this stage run every frame.
    #[inline]
    pub fn is_repeating(self) -> bool {
        self.phase() == Phase::Frame
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::PreStartup => "preStartup",
            Stage::Startup => "startup",
            Stage::PostStartup => "postStartup",
            Stage::First => "first",
            Stage::PreUpdate => "preUpdate",
            Stage::Update => "update",
            Stage::PostUpdate => "postUpdate",
            Stage::Last => "last",
            Stage::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The stages that may hold asynchronous systems: the ones the runtime
/// awaits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AsyncStage {
    PreStartup,
    Startup,
    PostStartup,
    Shutdown,
}

impl From<AsyncStage> for Stage {
    fn from(stage: AsyncStage) -> Self {
        match stage {
            AsyncStage::PreStartup => Stage::PreStartup,
            AsyncStage::Startup => Stage::Startup,
            AsyncStage::PostStartup => Stage::PostStartup,
            AsyncStage::Shutdown => Stage::Shutdown,
        }
    }
}
