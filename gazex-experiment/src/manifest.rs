//! Declarative experiment manifest.
//!
//! A manifest is loaded once per session and never mutated. Loading always
//! validates: a [`Manifest`] obtained through [`Manifest::from_json_str`] or
//! [`Manifest::from_path`] satisfies every structural invariant the session
//! relies on, so the state machine only has to guard against per-trial
//! conditions.

use crate::error::{ExperimentError, ExperimentResult};
use gazex_core::Ratio;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub shapes: Vec<String>,
    pub colors: Vec<String>,
    pub difficulty_levels: DifficultyLevels,
    pub blocks: usize,
    pub trials_per_block: usize,
    #[serde(default)]
    pub practice: Option<PracticeConfig>,
    pub constraints: Constraints,
    #[serde(default)]
    pub timings: Timings,
    #[serde(default)]
    pub paradigm: Paradigm,
    #[serde(default = "default_asset_extension")]
    pub asset_extension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeConfig {
    pub enabled: bool,
    pub blocks: usize,
    pub trials_per_block: usize,
    #[serde(default)]
    pub allow_color_repeat: bool,
    #[serde(default = "default_practice_difficulty")]
    pub difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub no_color_repeat_across_blocks: bool,
    pub target_ratio: Ratio,
    #[serde(default)]
    pub color_replenishment: ColorReplenishment,
    #[serde(default = "default_max_asset_retries")]
    pub max_asset_retries: usize,
}

/// What happens when the no-repeat color pool runs dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorReplenishment {
    /// Raise `ColorPoolExhausted`.
    #[default]
    Fail,
    /// Refill the pool from the full color list and keep drawing.
    Reset,
}

/// Trial paradigm: which single stimulus dimension the foils vary on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paradigm {
    /// Foils share the target's shape and color and differ only in ratio.
    #[default]
    Ratio,
    /// Foils share color and canonical ratio and differ only in shape.
    Shape,
    /// Foils share shape and canonical ratio and differ only in color.
    Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    #[serde(default = "default_fixation_ms")]
    pub fixation_ms: u64,
    /// Zero keeps the stimulus up until the participant responds.
    #[serde(default)]
    pub stimulus_ms: u64,
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
    #[serde(default = "default_rest_ms")]
    pub rest_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            fixation_ms: default_fixation_ms(),
            stimulus_ms: 0,
            response_timeout_ms: None,
            rest_ms: default_rest_ms(),
        }
    }
}

fn default_asset_extension() -> String {
    "png".to_string()
}

fn default_practice_difficulty() -> String {
    "easy".to_string()
}

fn default_max_asset_retries() -> usize {
    3
}

fn default_fixation_ms() -> u64 {
    500
}

fn default_rest_ms() -> u64 {
    10_000
}

/// Difficulty name to allowed foil ratios, in manifest order.
///
/// Order matters: it is the symbol order of the counterbalancing square, so
/// the JSON object is read entry by entry rather than into a hash map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DifficultyLevels(Vec<(String, Vec<Ratio>)>);

impl DifficultyLevels {
    pub fn new(levels: Vec<(String, Vec<Ratio>)>) -> Self {
        Self(levels)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&[Ratio]> {
        self.0
            .iter()
            .find(|(level, _)| level == name)
            .map(|(_, ratios)| ratios.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Ratio])> {
        self.0
            .iter()
            .map(|(name, ratios)| (name.as_str(), ratios.as_slice()))
    }
}

impl Serialize for DifficultyLevels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, ratios) in &self.0 {
            map.serialize_entry(name, ratios)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DifficultyLevels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelsVisitor;

        impl<'de> Visitor<'de> for LevelsVisitor {
            type Value = DifficultyLevels;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from difficulty name to a list of ratios")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut levels: Vec<(String, Vec<Ratio>)> = Vec::new();
                while let Some((name, ratios)) = access.next_entry::<String, Vec<Ratio>>()? {
                    if levels.iter().any(|(existing, _)| *existing == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate difficulty `{name}`"
                        )));
                    }
                    levels.push((name, ratios));
                }
                Ok(DifficultyLevels(levels))
            }
        }

        deserializer.deserialize_map(LevelsVisitor)
    }
}

impl Manifest {
    pub fn from_json_str(json: &str) -> ExperimentResult<Self> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|err| ExperimentError::MalformedManifest(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ExperimentResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every structural invariant, reporting the first violation.
    pub fn validate(&self) -> ExperimentResult<()> {
        let malformed = |msg: String| Err(ExperimentError::MalformedManifest(msg));

        if self.shapes.is_empty() {
            return malformed("`shapes` must not be empty".into());
        }
        if let Some(dup) = first_duplicate(&self.shapes) {
            return malformed(format!("`shapes` lists `{dup}` more than once"));
        }
        if self.colors.is_empty() {
            return malformed("`colors` must not be empty".into());
        }
        if let Some(dup) = first_duplicate(&self.colors) {
            return malformed(format!("`colors` lists `{dup}` more than once"));
        }
        if self.difficulty_levels.is_empty() {
            return malformed("`difficultyLevels` must define at least one level".into());
        }

        let canonical = self.constraints.target_ratio;
        for (name, ratios) in self.difficulty_levels.iter() {
            if ratios.is_empty() {
                return malformed(format!("difficulty `{name}` has no foil ratios"));
            }
            if ratios.contains(&canonical) {
                return malformed(format!(
                    "difficulty `{name}` includes the canonical ratio {canonical}"
                ));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = ratios.iter().find(|r| !seen.insert(**r)) {
                return malformed(format!("difficulty `{name}` lists ratio {dup} twice"));
            }
        }

        if self.blocks == 0 {
            return malformed("`blocks` must be positive".into());
        }
        if self.trials_per_block == 0 {
            return malformed("`trialsPerBlock` must be positive".into());
        }
        if self.constraints.no_color_repeat_across_blocks
            && self.constraints.color_replenishment == ColorReplenishment::Fail
            && self.blocks > self.colors.len()
        {
            return malformed(format!(
                "{} blocks need distinct colors but only {} colors are listed",
                self.blocks,
                self.colors.len()
            ));
        }

        if let Some(practice) = self.practice.as_ref().filter(|p| p.enabled) {
            if practice.blocks == 0 || practice.trials_per_block == 0 {
                return malformed("enabled practice needs positive `blocks` and `trialsPerBlock`".into());
            }
            if !self.difficulty_levels.contains(&practice.difficulty) {
                return malformed(format!(
                    "practice difficulty `{}` is not a defined level",
                    practice.difficulty
                ));
            }
        }

        match self.paradigm {
            Paradigm::Shape if self.shapes.len() < 2 => {
                malformed("shape paradigm needs at least two shapes".into())
            }
            Paradigm::Color if self.colors.len() < 2 => {
                malformed("color paradigm needs at least two colors".into())
            }
            _ => Ok(()),
        }
    }

    /// Difficulty names in manifest order.
    pub fn level_names(&self) -> Vec<String> {
        self.difficulty_levels.names()
    }

    pub fn target_ratio(&self) -> Ratio {
        self.constraints.target_ratio
    }

    /// Practice settings, only when practice is switched on.
    pub fn enabled_practice(&self) -> Option<&PracticeConfig> {
        self.practice.as_ref().filter(|p| p.enabled)
    }

    pub fn block_count(&self, practice: bool) -> usize {
        if practice {
            self.enabled_practice().map_or(0, |p| p.blocks)
        } else {
            self.blocks
        }
    }

    pub fn trials_in_block(&self, practice: bool) -> usize {
        if practice {
            self.enabled_practice().map_or(0, |p| p.trials_per_block)
        } else {
            self.trials_per_block
        }
    }

    /// Blocks in run order as `(index, is_practice)`: practice first.
    pub fn block_schedule(&self) -> Vec<(usize, bool)> {
        let practice = (0..self.block_count(true)).map(|index| (index, true));
        let experimental = (0..self.blocks).map(|index| (index, false));
        practice.chain(experimental).collect()
    }

    pub fn total_trials(&self) -> usize {
        self.block_count(true) * self.trials_in_block(true)
            + self.block_count(false) * self.trials_in_block(false)
    }
}

fn first_duplicate(items: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    items
        .iter()
        .find(|item| !seen.insert(item.as_str()))
        .map(String::as_str)
}
