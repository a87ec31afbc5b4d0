//! Error taxonomy for manifest loading and session execution.
//!
//! Configuration-time errors abort session construction entirely. Everything
//! else aborts only the operation that raised it: the session stays in the
//! phase it was in before the call, and nothing is appended to the log.

use gazex_core::SessionPhase;
use thiserror::Error;

pub type ExperimentResult<T> = Result<T, ExperimentError>;

#[derive(Debug, Error)]
pub enum ExperimentError {
    /// A required key is missing, has the wrong shape, or breaks a structural invariant.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// A block asked for a difficulty the manifest does not define.
    #[error("difficulty `{0}` is not defined in the manifest")]
    InvalidDifficulty(String),

    /// No foil satisfies the active paradigm and the block's difficulty.
    #[error("no foil candidates for difficulty `{difficulty}`: {reason}")]
    NoFoilCandidates { difficulty: String, reason: String },

    /// The no-repeat policy left no color for the next block.
    #[error("color pool exhausted after {used} blocks")]
    ColorPoolExhausted { used: usize },

    /// The asset loader reported a stimulus file as missing or unloadable.
    #[error("stimulus asset `{asset}` could not be resolved")]
    AssetResolutionFailure { asset: String },

    /// An operation was called in a phase that does not permit it.
    #[error("cannot {action} while session is {phase}")]
    InvalidTransition {
        phase: SessionPhase,
        action: &'static str,
    },

    #[error("block index {index} out of range ({available} {kind} blocks configured)")]
    BlockOutOfRange {
        index: usize,
        available: usize,
        kind: &'static str,
    },

    #[error("trial data log is finalized")]
    LogFinalized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

impl ExperimentError {
    /// True for errors that mean the session can never run.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, Self::MalformedManifest(_) | Self::Io(_))
    }
}
