//! Deterministic block and trial generation for gaze-tracked ratio
//! discrimination experiments.
//!
//! A session is a pure function of `(manifest, participant id)` up to the
//! participant's responses: difficulty order comes from a Latin square row,
//! and every color, shape, slot and foil draw comes from one Mulberry32
//! stream seeded with the participant id.

pub mod counterbalance;
pub mod error;
pub mod log;
pub mod manifest;
pub mod pool;
pub mod rng;
pub mod state;
pub mod trial;

pub use error::{ExperimentError, ExperimentResult};
pub use log::{PersistencePayload, Table, TrialDataLog};
pub use manifest::{ColorReplenishment, Constraints, DifficultyLevels, Manifest, Paradigm, PracticeConfig, Timings};
pub use pool::{AssetCatalog, AssetResolver, AssumeAllPresent, ColorDraw, StimulusPool};
pub use rng::SeededGenerator;
pub use state::{ExperimentSession, PlannedBlock};
pub use trial::{ActiveTrial, Block};
