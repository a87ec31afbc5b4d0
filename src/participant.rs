//! Simulated participant standing in for a person, a keyboard and a webcam.

use gazex_core::{Response, StimulusPosition, Trial};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Tunables for the simulated observer
#[derive(Debug, Clone)]
pub struct ParticipantProfile {
    /// Probability of picking the target on an answered trial.
    pub accuracy: f64,
    pub mean_rt_ms: f64,
    pub rt_jitter_ms: f64,
    /// Gaze estimator sampling rate.
    pub sample_hz: f64,
    /// Probability that the estimator returns no face for a sample.
    pub dropout: f64,
    pub screen_width: f64,
    pub screen_height: f64,
}

impl Default for ParticipantProfile {
    fn default() -> Self {
        Self {
            accuracy: 0.85,
            mean_rt_ms: 650.0,
            rt_jitter_ms: 150.0,
            sample_hz: 30.0,
            dropout: 0.05,
            screen_width: 1280.0,
            screen_height: 720.0,
        }
    }
}

/// What the participant will do on one trial
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedResponse {
    pub response: Response,
    pub rt_ms: u64,
    pub fixated: StimulusPosition,
}

pub struct SimulatedParticipant {
    profile: ParticipantProfile,
    rng: StdRng,
}

impl SimulatedParticipant {
    pub fn new(profile: ParticipantProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn profile(&self) -> &ParticipantProfile {
        &self.profile
    }

    pub fn respond(&mut self, trial: &Trial) -> PlannedResponse {
        let picks_target = self.rng.random_bool(self.profile.accuracy.clamp(0.0, 1.0));
        let fixated = if picks_target {
            trial.target_position
        } else {
            let foils: Vec<StimulusPosition> = StimulusPosition::ALL
                .into_iter()
                .filter(|p| *p != trial.target_position)
                .collect();
            foils[self.rng.random_range(0..foils.len())]
        };

        let jitter = self.profile.rt_jitter_ms.max(0.0);
        let offset = if jitter > 0.0 {
            self.rng.random_range(-jitter..=jitter)
        } else {
            0.0
        };
        let rt_ms = (self.profile.mean_rt_ms + offset).max(100.0).round() as u64;

        PlannedResponse {
            response: if picks_target {
                Response::Target
            } else {
                Response::Foil
            },
            rt_ms,
            fixated,
        }
    }

    /// Interval between gaze samples in milliseconds.
    pub fn sample_interval_ms(&self) -> u64 {
        (1000.0 / self.profile.sample_hz.max(1.0)).round().max(1.0) as u64
    }

    /// One gaze estimate near the centre of `slot`, or `None` on dropout.
    pub fn gaze_sample(&mut self, slot: StimulusPosition) -> Option<(f64, f64)> {
        if self.rng.random_bool(self.profile.dropout.clamp(0.0, 1.0)) {
            return None;
        }
        let third = self.profile.screen_width / 3.0;
        let column = match slot {
            StimulusPosition::Left => 0.5,
            StimulusPosition::Center => 1.5,
            StimulusPosition::Right => 2.5,
        };
        let spread = third * 0.25;
        let x = column * third + self.rng.random_range(-spread..=spread);
        let y = self.profile.screen_height / 2.0 + self.rng.random_range(-spread..=spread);
        Some((x, y))
    }
}
