use gazex_core::{GazeSample, Trial};
use serde::Serialize;

/// Block currently being run. Fixed from `start_block` until its last trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: usize,
    pub is_practice: bool,
    pub difficulty: String,
    pub color: String,
    pub trials: usize,
}

/// A generated trial waiting for its response
#[derive(Debug, Clone)]
pub struct ActiveTrial {
    pub index: usize,
    pub trial: Trial,
    pub target_asset: String,
    pub foil_assets: [String; 2],
    pub timestamps: TrialTimestamps,
    pub gaze: Vec<GazeSample>,
    pub dropped_gaze_samples: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct TrialTimestamps {
    pub start: u64,
    pub response: Option<u64>,
}

impl ActiveTrial {
    pub fn push_gaze(&mut self, point: Option<(f64, f64)>, now_ns: u64) {
        match point {
            Some((x, y)) if x.is_finite() && y.is_finite() => {
                let time_ms = now_ns.saturating_sub(self.timestamps.start) as f64 / 1_000_000.0;
                self.gaze.push(GazeSample { x, y, time_ms });
            }
            _ => self.dropped_gaze_samples += 1,
        }
    }
}
