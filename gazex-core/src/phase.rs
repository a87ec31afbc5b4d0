use serde::{Deserialize, Serialize};
use std::fmt;

/// States of a participant session
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    BlockActive,
    TrialActive,
    BlockComplete,
    SessionComplete,
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

impl SessionPhase {
    /// A new block may only start from a quiescent state.
    pub fn allows_block_start(&self) -> bool {
        matches!(self, Self::Idle | Self::BlockComplete)
    }

    pub fn allows_trial(&self) -> bool {
        matches!(self, Self::BlockActive)
    }

    pub fn allows_response(&self) -> bool {
        matches!(self, Self::TrialActive)
    }

    pub fn allows_rest(&self) -> bool {
        matches!(self, Self::BlockComplete)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionComplete)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BlockActive => "block-active",
            Self::TrialActive => "trial-active",
            Self::BlockComplete => "block-complete",
            Self::SessionComplete => "session-complete",
        };
        f.write_str(name)
    }
}
