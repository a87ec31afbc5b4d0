//! Stimulus pool: color allocation per block and foil candidate tables.

use crate::error::{ExperimentError, ExperimentResult};
use crate::manifest::{ColorReplenishment, Manifest, Paradigm};
use crate::rng::SeededGenerator;
use gazex_core::{Ratio, Stimulus};
use std::collections::HashSet;
use std::io;
use std::path::Path;
use tracing::warn;

/// Seam to the collaborator that loads stimulus images.
pub trait AssetResolver {
    /// Whether the named asset can be shown.
    fn is_available(&self, asset: &str) -> bool;
}

/// Resolver that trusts every asset name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAllPresent;

impl AssetResolver for AssumeAllPresent {
    fn is_available(&self, _asset: &str) -> bool {
        true
    }
}

/// Resolver backed by a known set of asset file names.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    names: HashSet<String>,
}

impl AssetCatalog {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Catalog of the regular files directly inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let mut names = HashSet::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl AssetResolver for AssetCatalog {
    fn is_available(&self, asset: &str) -> bool {
        self.names.contains(asset)
    }
}

/// Which color list a starting block draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDraw {
    Experimental,
    Practice { allow_repeat: bool },
}

/// Per-session stimulus state: the colors not yet handed to a block and
/// the assets the loader has reported missing.
#[derive(Debug, Clone)]
pub struct StimulusPool {
    colors: Vec<String>,
    remaining: Vec<String>,
    practice_remaining: Vec<String>,
    no_repeat: bool,
    replenishment: ColorReplenishment,
    extension: String,
    excluded: HashSet<String>,
}

impl StimulusPool {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            colors: manifest.colors.clone(),
            remaining: manifest.colors.clone(),
            practice_remaining: manifest.colors.clone(),
            no_repeat: manifest.constraints.no_color_repeat_across_blocks,
            replenishment: manifest.constraints.color_replenishment,
            extension: manifest.asset_extension.clone(),
            excluded: HashSet::new(),
        }
    }

    /// Refill the no-repeat pool with every manifest color, in manifest order.
    pub fn initialize_color_pool(&mut self) {
        self.remaining = self.colors.clone();
    }

    /// Colors still available to experimental blocks.
    pub fn remaining_colors(&self) -> &[String] {
        &self.remaining
    }

    /// Picks the color for a block about to start.
    ///
    /// Only experimental blocks under the no-repeat constraint take from
    /// `remaining_colors`. Practice blocks never do: with repeats allowed
    /// they draw from the full list, otherwise they cycle through a
    /// practice-only copy that refills itself when empty.
    pub fn allocate_color_for_block(
        &mut self,
        draw: ColorDraw,
        rng: &mut SeededGenerator,
    ) -> ExperimentResult<String> {
        match draw {
            ColorDraw::Practice { allow_repeat: true } => Ok(self.any_color(rng)),
            ColorDraw::Practice { allow_repeat: false } => {
                if self.practice_remaining.is_empty() {
                    self.practice_remaining = self.colors.clone();
                }
                let index = rng.pick_index(self.practice_remaining.len());
                Ok(self.practice_remaining.remove(index))
            }
            ColorDraw::Experimental if !self.no_repeat => Ok(self.any_color(rng)),
            ColorDraw::Experimental => {
                if self.remaining.is_empty() {
                    match self.replenishment {
                        ColorReplenishment::Reset => {
                            warn!(colors = self.colors.len(), "color pool exhausted, refilling");
                            self.initialize_color_pool();
                        }
                        ColorReplenishment::Fail => {
                            return Err(ExperimentError::ColorPoolExhausted {
                                used: self.colors.len(),
                            });
                        }
                    }
                }
                let index = rng.pick_index(self.remaining.len());
                Ok(self.remaining.remove(index))
            }
        }
    }

    fn any_color(&self, rng: &mut SeededGenerator) -> String {
        self.colors[rng.pick_index(self.colors.len())].clone()
    }

    pub fn asset_name(&self, stimulus: &Stimulus) -> String {
        stimulus.asset_name(&self.extension)
    }

    /// Drop an asset from every later draw in this session.
    pub fn exclude(&mut self, asset: String) {
        self.excluded.insert(asset);
    }

    pub fn is_excluded(&self, stimulus: &Stimulus) -> bool {
        self.excluded.contains(&self.asset_name(stimulus))
    }

    /// Shapes still eligible to carry the target for this block.
    pub fn target_candidates(&self, shapes: &[String], color: &str, ratio: Ratio) -> Vec<Stimulus> {
        shapes
            .iter()
            .map(|shape| Stimulus::new(shape.as_str(), color, ratio))
            .filter(|stim| !self.is_excluded(stim))
            .collect()
    }

    /// Every foil the paradigm allows against `target`, minus excluded assets.
    ///
    /// Each paradigm varies exactly one dimension; the other two are copied
    /// from the target.
    pub fn foil_candidates(
        &self,
        paradigm: Paradigm,
        target: &Stimulus,
        allowed_ratios: &[Ratio],
        shapes: &[String],
    ) -> Vec<Stimulus> {
        let candidates: Vec<Stimulus> = match paradigm {
            Paradigm::Ratio => allowed_ratios
                .iter()
                .filter(|ratio| **ratio != target.ratio)
                .map(|ratio| Stimulus::new(target.shape.as_str(), target.color.as_str(), *ratio))
                .collect(),
            Paradigm::Shape => shapes
                .iter()
                .filter(|shape| **shape != target.shape)
                .map(|shape| Stimulus::new(shape.as_str(), target.color.as_str(), target.ratio))
                .collect(),
            Paradigm::Color => self
                .colors
                .iter()
                .filter(|color| **color != target.color)
                .map(|color| Stimulus::new(target.shape.as_str(), color.as_str(), target.ratio))
                .collect(),
        };
        candidates
            .into_iter()
            .filter(|stim| !self.is_excluded(stim))
            .collect()
    }
}

/// Two foils drawn from a filtered candidate set.
///
/// The second foil is drawn from the candidates left after the first, so the
/// two differ whenever more than one candidate exists. A single candidate is
/// shown twice.
pub fn draw_foil_pair(
    candidates: &[Stimulus],
    rng: &mut SeededGenerator,
) -> Option<[Stimulus; 2]> {
    if candidates.is_empty() {
        return None;
    }
    let first = rng.pick_index(candidates.len());
    if candidates.len() == 1 {
        return Some([candidates[0].clone(), candidates[0].clone()]);
    }
    let mut second = rng.pick_index(candidates.len() - 1);
    if second >= first {
        second += 1;
    }
    Some([candidates[first].clone(), candidates[second].clone()])
}
