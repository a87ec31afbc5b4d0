use crate::participant::SimulatedParticipant;
use anyhow::{Context, Result};
use gazex_core::SessionPhase;
use gazex_experiment::{AssetResolver, ExperimentSession, Manifest, TrialDataLog};
use gazex_timing::Timer;
use std::time::Duration;
use tracing::{info, warn};

/// Drives one session from first block to last against a simulated participant.
///
/// The timer decides whether the run happens in wall-clock time
/// (`HighPrecisionTimer`) or instantly on a virtual clock (`ManualTimer`).
pub struct App<T: Timer, A: AssetResolver> {
    session: ExperimentSession<T, A>,
    timer: T,
    participant: SimulatedParticipant,
}

impl<T: Timer, A: AssetResolver> App<T, A> {
    pub fn new(
        manifest: Manifest,
        participant_id: u32,
        timer: T,
        resolver: A,
        participant: SimulatedParticipant,
    ) -> Result<Self> {
        let session = ExperimentSession::new(manifest, participant_id, timer.clone(), resolver)
            .context("cannot start session")?;
        Ok(Self {
            session,
            timer,
            participant,
        })
    }

    pub fn run(mut self) -> Result<TrialDataLog> {
        let schedule = self.session.manifest().block_schedule();
        let fixation = Duration::from_millis(self.session.manifest().timings.fixation_ms);
        let timeout_ms = self.session.manifest().timings.response_timeout_ms;

        println!(
            "Participant {}: difficulty order {:?}",
            self.session.participant_id(),
            self.session.block_difficulty_order()
        );

        for (index, practice) in schedule {
            if self.session.phase() == SessionPhase::BlockComplete {
                self.session.rest()?;
            }
            let block = self
                .session
                .start_block(index, practice)
                .with_context(|| format!("starting block {index} (practice: {practice})"))?;
            println!(
                "{} block {}: difficulty {}, color {}",
                if practice { "Practice" } else { "Experimental" },
                block.index,
                block.difficulty,
                block.color
            );

            while self.session.phase() == SessionPhase::BlockActive {
                self.timer.sleep(fixation);
                self.run_trial(timeout_ms)?;
            }
        }

        if !self.session.is_complete() {
            warn!(phase = %self.session.phase(), "schedule ended before the session completed");
        }
        let log = self.session.abandon();
        info!(trials = log.len(), "run finished");
        Ok(log)
    }

    fn run_trial(&mut self, timeout_ms: Option<u64>) -> Result<()> {
        let trial = self
            .session
            .generate_trial()
            .context("trial generation failed")?
            .clone();
        let planned = self.participant.respond(&trial);

        let deadline = match timeout_ms {
            Some(limit) => planned.rt_ms.min(limit),
            None => planned.rt_ms,
        };
        let interval = self.participant.sample_interval_ms();
        let mut elapsed = 0;
        while elapsed + interval <= deadline {
            self.timer.sleep(Duration::from_millis(interval));
            elapsed += interval;
            let sample = self.participant.gaze_sample(planned.fixated);
            self.session.record_gaze(sample)?;
        }
        self.timer.sleep(Duration::from_millis(deadline - elapsed));

        let timed_out = timeout_ms.is_some_and(|limit| planned.rt_ms > limit);
        let record = if timed_out {
            self.session.handle_timeout()?
        } else {
            self.session.handle_response(planned.response)?
        };
        println!(
            "  trial {:>3}: {} {:>5} rt {:>7.1} ms ({} gaze samples)",
            record.trial_index,
            record.target_asset,
            record.response.as_str(),
            record.rt,
            record.gaze_data.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantProfile;
    use gazex_experiment::AssumeAllPresent;
    use gazex_timing::ManualTimer;

    fn manifest(timeout: Option<u64>) -> Manifest {
        let mut json = serde_json::json!({
            "shapes": ["circle", "square"],
            "colors": ["red", "blue", "green"],
            "difficultyLevels": {"easy": ["1.25", "1.30"], "hard": ["1.50", "1.60"]},
            "blocks": 2,
            "trialsPerBlock": 3,
            "practice": {"enabled": true, "blocks": 1, "trialsPerBlock": 2, "allowColorRepeat": true},
            "constraints": {"noColorRepeatAcrossBlocks": true, "targetRatio": "1.00"},
            "timings": {"restMs": 5000}
        });
        if let Some(limit) = timeout {
            json["timings"]["responseTimeoutMs"] = serde_json::json!(limit);
        }
        Manifest::from_json_str(&json.to_string()).unwrap()
    }

    #[test]
    fn virtual_run_logs_every_trial() {
        let participant = SimulatedParticipant::new(ParticipantProfile::default(), 1);
        let app = App::new(manifest(None), 4, ManualTimer::new(), AssumeAllPresent, participant).unwrap();

        let log = app.run().unwrap();

        assert!(log.is_finalized());
        assert_eq!(log.len(), 8);
        assert!(log.records().iter().all(|r| !r.gaze_data.is_empty() || r.dropped_gaze_samples > 0));
    }

    #[test]
    fn slow_participant_times_out() {
        let profile = ParticipantProfile {
            mean_rt_ms: 2_000.0,
            rt_jitter_ms: 0.0,
            ..ParticipantProfile::default()
        };
        let participant = SimulatedParticipant::new(profile, 1);
        let app = App::new(manifest(Some(500)), 0, ManualTimer::new(), AssumeAllPresent, participant).unwrap();

        let log = app.run().unwrap();
        for record in log.records() {
            assert_eq!(record.response.as_str(), "timeout");
            assert!((record.rt - 500.0).abs() < 1e-6);
        }
    }
}
