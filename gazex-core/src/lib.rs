pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::SessionPhase;
pub use stimulus::{Ratio, RatioParseError, Stimulus, StimulusPosition};
pub use trial::{GazeSample, Response, Trial, TrialRecord};
