use crate::stimulus::{Ratio, Stimulus, StimulusPosition};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// One generated trial: a canonical target and two foils laid out on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub target: Stimulus,
    pub foils: [Stimulus; 2],
    pub target_position: StimulusPosition,
}

impl Trial {
    /// Stimuli in left-to-right screen order, paired with their slot and
    /// whether they are the target. Foils fill the non-target slots in order.
    pub fn layout(&self) -> [(StimulusPosition, &Stimulus, bool); 3] {
        let mut foils = self.foils.iter();
        StimulusPosition::ALL.map(|position| {
            if position == self.target_position {
                (position, &self.target, true)
            } else {
                let foil = foils.next().unwrap_or(&self.foils[1]);
                (position, foil, false)
            }
        })
    }
}

/// Participant response to a trial.
///
/// `target` and `foil` are the two reserved choices; `timeout` is logged
/// when a caller-side timer wins the race against the participant. Any other
/// raw value is preserved verbatim as an anomalous response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Response {
    Target,
    Foil,
    Timeout,
    Anomalous(String),
}

impl Response {
    pub fn is_correct(&self) -> bool {
        matches!(self, Response::Target)
    }

    pub fn is_anomalous(&self) -> bool {
        matches!(self, Response::Anomalous(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Response::Target => "target",
            Response::Foil => "foil",
            Response::Timeout => "timeout",
            Response::Anomalous(raw) => raw,
        }
    }
}

impl FromStr for Response {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "target" => Response::Target,
            "foil" => Response::Foil,
            "timeout" => Response::Timeout,
            other => Response::Anomalous(other.to_string()),
        })
    }
}

impl From<String> for Response {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl From<Response> for String {
    fn from(response: Response) -> Self {
        response.as_str().to_string()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gaze estimate in screen pixels, timed from trial start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "time")]
    pub time_ms: f64,
}

/// Recorded result per completed trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub participant_id: u32,
    pub practice: bool,
    pub block_index: usize,
    pub trial_index: usize,
    pub shape: String,
    pub color: String,
    pub difficulty: String,
    pub foil_ratio: Ratio,
    pub response: Response,
    pub correct: bool,
    /// Reaction time in milliseconds.
    pub rt: f64,
    pub second_foil_ratio: Ratio,
    pub target_position: StimulusPosition,
    pub target_asset: String,
    pub foil_assets: Vec<String>,
    pub gaze_data: Vec<GazeSample>,
    pub dropped_gaze_samples: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trial(target_position: StimulusPosition) -> Trial {
        Trial {
            target: Stimulus::new("circle", "red", Ratio::CANONICAL),
            foils: [
                Stimulus::new("circle", "red", Ratio::from_hundredths(125)),
                Stimulus::new("circle", "red", Ratio::from_hundredths(150)),
            ],
            target_position,
        }
    }

    #[test]
    fn layout_places_target_and_fills_remaining_slots() {
        let trial = sample_trial(StimulusPosition::Center);
        let layout = trial.layout();

        assert_eq!(layout[0].0, StimulusPosition::Left);
        assert_eq!(layout[0].1.ratio, Ratio::from_hundredths(125));
        assert!(layout[1].2);
        assert_eq!(layout[1].1.ratio, Ratio::CANONICAL);
        assert_eq!(layout[2].1.ratio, Ratio::from_hundredths(150));
        assert_eq!(layout.iter().filter(|slot| slot.2).count(), 1);
    }

    #[test]
    fn only_target_responses_are_correct() {
        assert!(Response::Target.is_correct());
        assert!(!Response::Foil.is_correct());
        assert!(!Response::Timeout.is_correct());
        assert!(!Response::from("left".to_string()).is_correct());
    }

    #[test]
    fn unknown_responses_are_kept_verbatim() {
        let response: Response = "space".parse().unwrap();
        assert_eq!(response, Response::Anomalous("space".into()));
        assert!(response.is_anomalous());
        assert_eq!(serde_json::to_string(&response).unwrap(), "\"space\"");

        let timeout: Response = serde_json::from_str("\"timeout\"").unwrap();
        assert_eq!(timeout, Response::Timeout);
    }
}
