use super::counterbalance;
use super::error::{ExperimentError, ExperimentResult};
use super::log::TrialDataLog;
use super::manifest::Manifest;
use super::pool::{AssetResolver, AssumeAllPresent, ColorDraw, StimulusPool, draw_foil_pair};
use super::rng::SeededGenerator;
use super::trial::{ActiveTrial, Block, TrialTimestamps};
use gazex_core::{Response, SessionPhase, Stimulus, StimulusPosition, Trial, TrialRecord};
use gazex_timing::{ManualTimer, Timer};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One participant's run through the manifest.
///
/// The session owns every piece of mutable experiment state: the seeded
/// generator, the color pool, the active block and trial, and the log.
/// Nothing is shared between sessions, so hosts may run one per participant
/// on any thread.
pub struct ExperimentSession<T, A = AssumeAllPresent>
where
    T: Timer,
    A: AssetResolver,
{
    participant_id: u32,
    manifest: Manifest,
    block_difficulty_order: Vec<String>,
    rng: SeededGenerator,
    pool: StimulusPool,
    timer: T,
    resolver: A,
    phase: SessionPhase,
    block: Option<Block>,
    current: Option<ActiveTrial>,
    block_trial_number: usize,
    completed_blocks: BTreeSet<usize>,
    log: TrialDataLog,
}

/// A block and the trials generated for it, as produced by [`ExperimentSession::plan`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedBlock {
    pub block: Block,
    pub trials: Vec<Trial>,
}

enum Rejected {
    Target(String),
    Foil(String),
}

impl<T, A> ExperimentSession<T, A>
where
    T: Timer,
    A: AssetResolver,
{
    pub fn new(manifest: Manifest, participant_id: u32, timer: T, resolver: A) -> ExperimentResult<Self> {
        manifest.validate()?;

        let block_difficulty_order = counterbalance::assign(participant_id, &manifest.level_names());
        let pool = StimulusPool::new(&manifest);

        info!(
            participant_id,
            order = ?block_difficulty_order,
            paradigm = ?manifest.paradigm,
            "session initialised"
        );

        Ok(Self {
            participant_id,
            block_difficulty_order,
            rng: SeededGenerator::new(participant_id),
            pool,
            timer,
            resolver,
            phase: SessionPhase::Idle,
            block: None,
            current: None,
            block_trial_number: 0,
            completed_blocks: BTreeSet::new(),
            log: TrialDataLog::new(participant_id),
            manifest,
        })
    }

    pub fn start_block(&mut self, index: usize, is_practice: bool) -> ExperimentResult<&Block> {
        if !self.phase.allows_block_start() {
            return Err(self.invalid("start a block"));
        }

        let available = self.manifest.block_count(is_practice);
        if index >= available {
            return Err(ExperimentError::BlockOutOfRange {
                index,
                available,
                kind: if is_practice { "practice" } else { "experimental" },
            });
        }

        if !is_practice && self.completed_blocks.contains(&index) {
            return Err(self.invalid("restart a completed block"));
        }

        let (difficulty, draw) = match self.manifest.enabled_practice() {
            Some(practice) if is_practice => (
                practice.difficulty.clone(),
                ColorDraw::Practice {
                    allow_repeat: practice.allow_color_repeat,
                },
            ),
            _ => {
                let order = &self.block_difficulty_order;
                (order[index % order.len()].clone(), ColorDraw::Experimental)
            }
        };

        let color = self.pool.allocate_color_for_block(draw, &mut self.rng)?;

        info!(
            block = index,
            practice = is_practice,
            difficulty = %difficulty,
            color = %color,
            "block started"
        );

        self.block_trial_number = 0;
        self.phase = SessionPhase::BlockActive;
        Ok(&*self.block.insert(Block {
            index,
            is_practice,
            difficulty,
            color,
            trials: self.manifest.trials_in_block(is_practice),
        }))
    }

    /// Draws the next trial of the active block.
    ///
    /// Candidates are filtered before drawing, so an out-of-policy stimulus is
    /// never produced. Assets reported missing are excluded for the rest of
    /// the session and the draw is repeated, up to `maxAssetRetries` times.
    /// On error the session stays in `BlockActive` with no trial active.
    pub fn generate_trial(&mut self) -> ExperimentResult<&Trial> {
        if !self.phase.allows_trial() {
            return Err(self.invalid("generate a trial"));
        }
        let Some(block) = self.block.clone() else {
            return Err(self.invalid("generate a trial"));
        };

        let Some(allowed_ratios) = self.manifest.difficulty_levels.get(&block.difficulty) else {
            return Err(ExperimentError::InvalidDifficulty(block.difficulty));
        };
        let canonical = self.manifest.target_ratio();
        let attempts = self.manifest.constraints.max_asset_retries + 1;
        let mut last_rejection = None;

        for attempt in 0..attempts {
            let targets = self
                .pool
                .target_candidates(&self.manifest.shapes, &block.color, canonical);
            if targets.is_empty() {
                let asset = match last_rejection {
                    Some(Rejected::Target(asset)) => asset,
                    _ => format!("*-{canonical}-{}.{}", block.color, self.manifest.asset_extension),
                };
                return Err(ExperimentError::AssetResolutionFailure { asset });
            }
            // a target whose foils are all excluded can never form a trial
            let mut viable: Vec<(Stimulus, Vec<Stimulus>)> = targets
                .into_iter()
                .filter_map(|target| {
                    let foils = self.pool.foil_candidates(
                        self.manifest.paradigm,
                        &target,
                        allowed_ratios,
                        &self.manifest.shapes,
                    );
                    (!foils.is_empty()).then_some((target, foils))
                })
                .collect();
            if viable.is_empty() {
                return Err(ExperimentError::NoFoilCandidates {
                    difficulty: block.difficulty,
                    reason: match last_rejection {
                        Some(Rejected::Foil(asset)) => format!("last candidate `{asset}` is missing"),
                        _ => format!("{:?} paradigm leaves no candidate", self.manifest.paradigm),
                    },
                });
            }

            let (target, candidates) = viable.swap_remove(self.rng.pick_index(viable.len()));
            let target_position = StimulusPosition::ALL[self.rng.pick_index(StimulusPosition::ALL.len())];
            let Some(foils) = draw_foil_pair(&candidates, &mut self.rng) else {
                return Err(ExperimentError::NoFoilCandidates {
                    difficulty: block.difficulty,
                    reason: "empty foil set".into(),
                });
            };

            let target_asset = self.pool.asset_name(&target);
            let foil_assets = [self.pool.asset_name(&foils[0]), self.pool.asset_name(&foils[1])];

            if let Some(rejection) = self.first_missing(&target_asset, &foil_assets) {
                let asset = match &rejection {
                    Rejected::Target(asset) | Rejected::Foil(asset) => asset.clone(),
                };
                warn!(attempt, asset = %asset, "stimulus asset missing, excluding from draws");
                self.pool.exclude(asset);
                last_rejection = Some(rejection);
                continue;
            }

            let trial = Trial {
                target,
                foils,
                target_position,
            };
            debug!(
                block = block.index,
                trial = self.block_trial_number,
                target = %target_asset,
                foils = ?foil_assets,
                position = %target_position,
                "trial generated"
            );

            self.phase = SessionPhase::TrialActive;
            let active = self.current.insert(ActiveTrial {
                index: self.block_trial_number,
                trial,
                target_asset,
                foil_assets,
                timestamps: TrialTimestamps {
                    start: self.timer.now(),
                    response: None,
                },
                gaze: Vec::new(),
                dropped_gaze_samples: 0,
            });
            return Ok(&active.trial);
        }

        Err(match last_rejection {
            Some(Rejected::Target(asset)) => ExperimentError::AssetResolutionFailure { asset },
            Some(Rejected::Foil(asset)) => ExperimentError::NoFoilCandidates {
                difficulty: block.difficulty,
                reason: format!("asset retries exhausted, last missing `{asset}`"),
            },
            None => ExperimentError::NoFoilCandidates {
                difficulty: block.difficulty,
                reason: "no draw attempted".into(),
            },
        })
    }

    fn first_missing(&self, target_asset: &str, foil_assets: &[String; 2]) -> Option<Rejected> {
        if !self.resolver.is_available(target_asset) {
            return Some(Rejected::Target(target_asset.to_string()));
        }
        foil_assets
            .iter()
            .find(|asset| !self.resolver.is_available(asset))
            .map(|asset| Rejected::Foil(asset.clone()))
    }

    /// Attach one gaze estimator sample to the active trial; `None` counts as dropped.
    pub fn record_gaze(&mut self, point: Option<(f64, f64)>) -> ExperimentResult<()> {
        if !self.phase.allows_response() {
            return Err(self.invalid("record gaze"));
        }
        let now_ns = self.timer.now();
        if let Some(trial) = &mut self.current {
            trial.push_gaze(point, now_ns);
        }
        Ok(())
    }

    /// Completes the active trial and appends its record to the log.
    pub fn handle_response(&mut self, response: Response) -> ExperimentResult<&TrialRecord> {
        if !self.phase.allows_response() {
            return Err(self.invalid("record a response"));
        }
        let (Some(mut active), Some(block)) = (self.current.take(), self.block.clone()) else {
            return Err(self.invalid("record a response"));
        };

        let now_ns = self.timer.now();
        active.timestamps.response = Some(now_ns);
        let rt = Duration::from_nanos(now_ns.saturating_sub(active.timestamps.start)).as_secs_f64() * 1000.0;

        if response.is_anomalous() {
            warn!(response = %response, "anomalous response logged");
        }

        let [first_foil, second_foil] = &active.trial.foils;
        let record = TrialRecord {
            participant_id: self.participant_id,
            practice: block.is_practice,
            block_index: block.index,
            trial_index: active.index,
            shape: active.trial.target.shape.clone(),
            color: active.trial.target.color.clone(),
            difficulty: block.difficulty.clone(),
            foil_ratio: first_foil.ratio,
            correct: response.is_correct(),
            response,
            rt,
            second_foil_ratio: second_foil.ratio,
            target_position: active.trial.target_position,
            target_asset: active.target_asset,
            foil_assets: active.foil_assets.to_vec(),
            gaze_data: active.gaze,
            dropped_gaze_samples: active.dropped_gaze_samples,
        };
        debug!(
            block = record.block_index,
            trial = record.trial_index,
            response = %record.response,
            correct = record.correct,
            rt_ms = record.rt,
            "trial logged"
        );
        self.log.append(record)?;

        self.block_trial_number += 1;
        if self.block_trial_number < block.trials {
            self.phase = SessionPhase::BlockActive;
        } else {
            self.finish_block(&block);
        }

        self.log
            .records()
            .last()
            .ok_or(ExperimentError::LogFinalized)
    }

    /// Shorthand for logging a trial whose response window ran out.
    pub fn handle_timeout(&mut self) -> ExperimentResult<&TrialRecord> {
        self.handle_response(Response::Timeout)
    }

    fn finish_block(&mut self, block: &Block) {
        self.block = None;
        if !block.is_practice {
            self.completed_blocks.insert(block.index);
        }

        if self.completed_blocks.len() >= self.manifest.blocks {
            self.phase = SessionPhase::SessionComplete;
            self.log.finalize();
            info!(
                participant_id = self.participant_id,
                trials = self.log.len(),
                "session complete"
            );
        } else {
            self.phase = SessionPhase::BlockComplete;
            info!(block = block.index, practice = block.is_practice, "block complete");
        }
    }

    /// Inter-block rest: a timed pause that changes no state.
    pub fn rest(&self) -> ExperimentResult<()> {
        if !self.phase.allows_rest() {
            return Err(self.invalid("rest"));
        }
        let pause = Duration::from_millis(self.manifest.timings.rest_ms);
        debug!(rest_ms = self.manifest.timings.rest_ms, "resting");
        self.timer.sleep(pause);
        Ok(())
    }

    /// Refill the color pool; only between blocks.
    pub fn initialize_color_pool(&mut self) -> ExperimentResult<()> {
        if !self.phase.allows_block_start() {
            return Err(self.invalid("reinitialize the color pool"));
        }
        self.pool.initialize_color_pool();
        Ok(())
    }

    /// Ends the session where it stands. A generated but unanswered trial is
    /// discarded; the log keeps only completed trials.
    pub fn abandon(mut self) -> TrialDataLog {
        let discarded = self.current.take().is_some();
        info!(
            participant_id = self.participant_id,
            phase = %self.phase,
            discarded_trial = discarded,
            trials = self.log.len(),
            "session abandoned"
        );
        self.log
    }

    fn invalid(&self, action: &'static str) -> ExperimentError {
        ExperimentError::InvalidTransition {
            phase: self.phase,
            action,
        }
    }

    pub fn participant_id(&self) -> u32 {
        self.participant_id
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn block_difficulty_order(&self) -> &[String] {
        &self.block_difficulty_order
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.block.as_ref()
    }

    pub fn current_trial(&self) -> Option<&Trial> {
        self.current.as_ref().map(|active| &active.trial)
    }

    /// Asset names of the active trial's target and foils.
    pub fn current_assets(&self) -> Option<(&str, [&str; 2])> {
        self.current.as_ref().map(|active| {
            (
                active.target_asset.as_str(),
                [active.foil_assets[0].as_str(), active.foil_assets[1].as_str()],
            )
        })
    }

    pub fn remaining_colors(&self) -> &[String] {
        self.pool.remaining_colors()
    }

    pub fn log(&self) -> &TrialDataLog {
        &self.log
    }

    /// `(trial number within block, 1-based; trials in block)`.
    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        self.block
            .as_ref()
            .map(|block| (self.block_trial_number + 1, block.trials))
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }
}

impl ExperimentSession<ManualTimer, AssumeAllPresent> {
    /// Dry-runs the full schedule for a participant and returns every block
    /// with its trials, without touching a real clock or asset store.
    pub fn plan(manifest: &Manifest, participant_id: u32) -> ExperimentResult<Vec<PlannedBlock>> {
        let mut session = Self::new(manifest.clone(), participant_id, ManualTimer::new(), AssumeAllPresent)?;
        let mut planned = Vec::new();

        for (index, is_practice) in manifest.block_schedule() {
            let block = session.start_block(index, is_practice)?.clone();
            let mut trials = Vec::with_capacity(block.trials);
            for _ in 0..block.trials {
                trials.push(session.generate_trial()?.clone());
                session.handle_response(Response::Target)?;
            }
            planned.push(PlannedBlock { block, trials });
        }

        Ok(planned)
    }
}

impl<T, A> std::fmt::Debug for ExperimentSession<T, A>
where
    T: Timer,
    A: AssetResolver,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentSession")
            .field("participant_id", &self.participant_id)
            .field("phase", &self.phase)
            .field("block", &self.block)
            .field("block_trial_number", &self.block_trial_number)
            .field("logged", &self.log.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::AssetCatalog;
    use gazex_core::Ratio;

    fn manifest(extra: serde_json::Value) -> Manifest {
        let mut json = serde_json::json!({
            "shapes": ["circle", "square"],
            "colors": ["red", "blue", "green"],
            "difficultyLevels": {"easy": ["1.25"], "hard": ["1.50"]},
            "blocks": 2,
            "trialsPerBlock": 2,
            "constraints": {"noColorRepeatAcrossBlocks": true, "targetRatio": "1.00"}
        });
        if let (Some(base), serde_json::Value::Object(extra)) = (json.as_object_mut(), extra) {
            base.extend(extra);
        }
        Manifest::from_json_str(&json.to_string()).unwrap()
    }

    fn session(manifest: Manifest, pid: u32) -> (ExperimentSession<ManualTimer>, ManualTimer) {
        let timer = ManualTimer::new();
        let session = ExperimentSession::new(manifest, pid, timer.clone(), AssumeAllPresent).unwrap();
        (session, timer)
    }

    #[test]
    fn walks_through_every_phase() {
        let (mut session, _) = session(manifest(serde_json::json!({})), 0);
        assert_eq!(session.phase(), SessionPhase::Idle);

        session.start_block(0, false).unwrap();
        assert_eq!(session.phase(), SessionPhase::BlockActive);

        session.generate_trial().unwrap();
        assert_eq!(session.phase(), SessionPhase::TrialActive);

        session.handle_response(Response::Target).unwrap();
        assert_eq!(session.phase(), SessionPhase::BlockActive);
        assert_eq!(session.trial_progress(), Some((2, 2)));

        session.generate_trial().unwrap();
        session.handle_response(Response::Foil).unwrap();
        assert_eq!(session.phase(), SessionPhase::BlockComplete);
        assert!(session.current_block().is_none());

        session.rest().unwrap();
        session.start_block(1, false).unwrap();
        for _ in 0..2 {
            session.generate_trial().unwrap();
            session.handle_response(Response::Target).unwrap();
        }
        assert_eq!(session.phase(), SessionPhase::SessionComplete);
        assert!(session.log().is_finalized());
        assert_eq!(session.log().len(), 4);
    }

    #[test]
    fn out_of_order_calls_are_rejected_without_side_effects() {
        let (mut session, _) = session(manifest(serde_json::json!({})), 0);

        assert!(matches!(
            session.generate_trial(),
            Err(ExperimentError::InvalidTransition { phase: SessionPhase::Idle, .. })
        ));
        assert!(session.handle_response(Response::Target).is_err());
        assert!(session.rest().is_err());
        assert!(session.record_gaze(Some((1.0, 1.0))).is_err());

        session.start_block(0, false).unwrap();
        assert!(session.start_block(1, false).is_err());
        assert!(session.handle_response(Response::Target).is_err());

        session.generate_trial().unwrap();
        assert!(session.generate_trial().is_err());
        assert!(session.log().is_empty());
    }

    #[test]
    fn reaction_time_is_measured_from_trial_start() {
        let (mut session, timer) = session(manifest(serde_json::json!({})), 0);
        session.start_block(0, false).unwrap();
        timer.advance_ms(1_000);
        session.generate_trial().unwrap();
        timer.advance_ms(432);

        let record = session.handle_response(Response::Target).unwrap();
        assert!((record.rt - 432.0).abs() < 1e-9);
        assert!(record.correct);
    }

    #[test]
    fn gaze_samples_land_in_the_record() {
        let (mut session, timer) = session(manifest(serde_json::json!({})), 0);
        session.start_block(0, false).unwrap();
        session.generate_trial().unwrap();
        timer.advance_ms(16);
        session.record_gaze(Some((120.0, 80.0))).unwrap();
        timer.advance_ms(16);
        session.record_gaze(None).unwrap();

        let record = session.handle_response(Response::Foil).unwrap();
        assert_eq!(record.gaze_data.len(), 1);
        assert_eq!(record.gaze_data[0].time_ms, 16.0);
        assert_eq!(record.dropped_gaze_samples, 1);
        assert!(!record.correct);
    }

    #[test]
    fn timeout_and_anomalous_responses_are_logged() {
        let (mut session, _) = session(manifest(serde_json::json!({})), 0);
        session.start_block(0, false).unwrap();
        session.generate_trial().unwrap();
        assert_eq!(session.handle_timeout().unwrap().response, Response::Timeout);

        session.generate_trial().unwrap();
        let record = session.handle_response("escape".parse().unwrap()).unwrap();
        assert_eq!(record.response, Response::Anomalous("escape".into()));
        assert!(!record.correct);
        assert_eq!(session.log().len(), 2);
    }

    #[test]
    fn abandoning_discards_the_unanswered_trial() {
        let (mut session, _) = session(manifest(serde_json::json!({})), 0);
        session.start_block(0, false).unwrap();
        session.generate_trial().unwrap();
        session.handle_response(Response::Target).unwrap();
        session.generate_trial().unwrap();

        let log = session.abandon();
        assert_eq!(log.len(), 1);
        assert!(!log.is_finalized());
    }

    #[test]
    fn block_index_beyond_manifest_is_rejected() {
        let (mut session, _) = session(manifest(serde_json::json!({})), 0);
        assert!(matches!(
            session.start_block(2, false),
            Err(ExperimentError::BlockOutOfRange { index: 2, available: 2, .. })
        ));
        assert!(matches!(
            session.start_block(0, true),
            Err(ExperimentError::BlockOutOfRange { available: 0, .. })
        ));
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn practice_blocks_use_practice_settings() {
        let manifest = manifest(serde_json::json!({
            "practice": {"enabled": true, "blocks": 1, "trialsPerBlock": 3, "allowColorRepeat": true}
        }));
        let (mut session, _) = session(manifest, 5);

        let block = session.start_block(0, true).unwrap().clone();
        assert_eq!(block.difficulty, "easy");
        assert_eq!(block.trials, 3);
        assert_eq!(session.remaining_colors().len(), 3);

        for _ in 0..3 {
            let trial = session.generate_trial().unwrap().clone();
            assert_eq!(trial.foils[0].ratio, Ratio::from_hundredths(125));
            let record = session.handle_response(Response::Target).unwrap();
            assert!(record.practice);
        }
        assert_eq!(session.phase(), SessionPhase::BlockComplete);
    }

    #[test]
    fn missing_difficulty_fails_the_trial_only() {
        let (mut session, _) = session(manifest(serde_json::json!({})), 0);
        session.start_block(0, false).unwrap();
        if let Some(block) = session.block.as_mut() {
            block.difficulty = "medium".into();
        }

        let err = session.generate_trial().unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidDifficulty(ref name) if name == "medium"));
        assert_eq!(session.phase(), SessionPhase::BlockActive);
        assert!(session.current_trial().is_none());
    }

    #[test]
    fn missing_foil_assets_are_excluded_and_retried() {
        let manifest = manifest(serde_json::json!({
            "difficultyLevels": {"easy": ["1.25", "1.30"], "hard": ["1.50", "1.60"]}
        }));
        let mut names = Vec::new();
        for shape in ["circle", "square"] {
            for color in ["red", "blue", "green"] {
                for ratio in ["1.00", "1.30", "1.50", "1.60"] {
                    names.push(format!("{shape}-{ratio}-{color}.png"));
                }
            }
        }
        let catalog = AssetCatalog::from_names(names);
        let mut session = ExperimentSession::new(manifest, 0, ManualTimer::new(), catalog).unwrap();

        session.start_block(0, false).unwrap();
        for _ in 0..2 {
            let trial = session.generate_trial().unwrap().clone();
            assert!(trial.foils.iter().all(|f| f.ratio == Ratio::from_hundredths(130)));
            session.handle_response(Response::Target).unwrap();
        }
    }

    #[test]
    fn all_foil_assets_missing_escalates() {
        let manifest = manifest(serde_json::json!({}));
        let catalog = AssetCatalog::from_names([
            "circle-1.00-red.png",
            "circle-1.00-blue.png",
            "circle-1.00-green.png",
            "square-1.00-red.png",
            "square-1.00-blue.png",
            "square-1.00-green.png",
        ]);
        let mut session = ExperimentSession::new(manifest, 0, ManualTimer::new(), catalog).unwrap();
        session.start_block(0, false).unwrap();

        let err = session.generate_trial().unwrap_err();
        assert!(matches!(err, ExperimentError::NoFoilCandidates { .. }));
        assert_eq!(session.phase(), SessionPhase::BlockActive);
    }

    #[test]
    fn target_shape_without_foils_is_skipped() {
        let manifest = manifest(serde_json::json!({
            "colors": ["red"],
            "blocks": 1,
            "difficultyLevels": {"easy": ["1.25"]},
            "constraints": {"noColorRepeatAcrossBlocks": true, "targetRatio": "1.00", "maxAssetRetries": 10}
        }));
        for pid in 0..50 {
            let catalog = AssetCatalog::from_names(["circle-1.00-red.png", "square-1.00-red.png", "square-1.25-red.png"]);
            let mut session = ExperimentSession::new(manifest.clone(), pid, ManualTimer::new(), catalog).unwrap();
            session.start_block(0, false).unwrap();

            for _ in 0..2 {
                let trial = session.generate_trial().unwrap().clone();
                assert_eq!(trial.target.shape, "square", "pid {pid}");
                assert!(trial.foils.iter().all(|f| f.shape == "square"));
                session.handle_response(Response::Target).unwrap();
            }
        }
    }

    #[test]
    fn completed_block_cannot_be_restarted() {
        let manifest = manifest(serde_json::json!({"trialsPerBlock": 1}));
        let (mut session, _) = session(manifest, 0);
        session.start_block(0, false).unwrap();
        session.generate_trial().unwrap();
        session.handle_response(Response::Target).unwrap();
        let remaining = session.remaining_colors().len();

        let err = session.start_block(0, false).unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidTransition { action: "restart a completed block", .. }));
        assert_eq!(session.remaining_colors().len(), remaining);
        assert_eq!(session.phase(), SessionPhase::BlockComplete);
        assert!(session.start_block(1, false).is_ok());
    }

    #[test]
    fn missing_targets_escalate_to_asset_failure() {
        let manifest = manifest(serde_json::json!({}));
        let catalog = AssetCatalog::from_names(Vec::<String>::new());
        let mut session = ExperimentSession::new(manifest, 0, ManualTimer::new(), catalog).unwrap();
        session.start_block(0, false).unwrap();

        let err = session.generate_trial().unwrap_err();
        assert!(matches!(err, ExperimentError::AssetResolutionFailure { .. }));
    }

    #[test]
    fn shape_paradigm_varies_only_shape() {
        let manifest = manifest(serde_json::json!({"paradigm": "shape"}));
        let (mut session, _) = session(manifest, 2);
        session.start_block(0, false).unwrap();
        let trial = session.generate_trial().unwrap().clone();

        for foil in &trial.foils {
            assert_ne!(foil.shape, trial.target.shape);
            assert_eq!(foil.color, trial.target.color);
            assert_eq!(foil.ratio, Ratio::CANONICAL);
        }
    }

    #[test]
    fn plan_matches_live_generation() {
        let manifest = manifest(serde_json::json!({}));
        let planned = ExperimentSession::plan(&manifest, 11).unwrap();
        let (mut session, _) = session(manifest, 11);

        for block in &planned {
            assert_eq!(session.start_block(block.block.index, false).unwrap(), &block.block);
            for trial in &block.trials {
                assert_eq!(session.generate_trial().unwrap(), trial);
                session.handle_response(Response::Foil).unwrap();
            }
        }
    }
}
