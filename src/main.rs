//! gazex - run and audit gaze-tracked ratio discrimination sessions
//!
//! Usage:
//!   gazex validate manifest.json
//!   gazex plan manifest.json --participant 7
//!   gazex run manifest.json --participant 7 --output p7.json --csv p7.csv

mod app;
mod participant;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, Subcommand};
use gazex_experiment::{AssetCatalog, AssumeAllPresent, ExperimentSession, Manifest, TrialDataLog};
use gazex_timing::{HighPrecisionTimer, ManualTimer};
use participant::{ParticipantProfile, SimulatedParticipant};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gazex")]
#[command(about = "Deterministic trial generation for gaze-tracked psychophysics sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a manifest and report whether it is usable
    Validate {
        /// Manifest JSON file
        manifest: PathBuf,
    },

    /// Print the block and trial schedule a participant would see
    Plan {
        /// Manifest JSON file
        manifest: PathBuf,

        /// Participant id (seeds all randomness)
        #[arg(short, long)]
        participant: u32,

        /// Output the schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a full session against a simulated participant
    Run {
        /// Manifest JSON file
        manifest: PathBuf,

        /// Participant id (seeds all randomness)
        #[arg(short, long)]
        participant: u32,

        /// Directory of stimulus images; missing files are excluded from draws
        #[arg(long)]
        assets: Option<PathBuf>,

        /// Where to write the persistence document (default: participant-<id>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the trial table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Pace the run in wall-clock time instead of a virtual clock
        #[arg(long)]
        realtime: bool,

        /// Probability the simulated participant picks the target
        #[arg(long, default_value_t = 0.85)]
        accuracy: f64,

        /// Mean simulated reaction time in milliseconds
        #[arg(long, default_value_t = 650.0)]
        mean_rt_ms: f64,

        /// Simulated gaze sampling rate
        #[arg(long, default_value_t = 30.0)]
        sample_hz: f64,

        /// Seed for the simulated participant (defaults to the participant id)
        #[arg(long)]
        responder_seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { manifest } => {
            let manifest = load_manifest(&manifest)?;
            println!("Manifest OK");
            println!("  shapes: {}", manifest.shapes.join(", "));
            println!("  colors: {}", manifest.colors.join(", "));
            for (name, ratios) in manifest.difficulty_levels.iter() {
                let ratios: Vec<String> = ratios.iter().map(ToString::to_string).collect();
                println!("  difficulty {name}: {}", ratios.join(", "));
            }
            println!(
                "  {} practice + {} experimental blocks, {} trials total",
                manifest.block_count(true),
                manifest.block_count(false),
                manifest.total_trials()
            );
        }
        Commands::Plan {
            manifest,
            participant,
            json,
        } => {
            let manifest = load_manifest(&manifest)?;
            let planned = ExperimentSession::plan(&manifest, participant)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&planned)?);
            } else {
                for block in &planned {
                    println!(
                        "{} block {} [{} / {}]",
                        if block.block.is_practice { "practice" } else { "experimental" },
                        block.block.index,
                        block.block.difficulty,
                        block.block.color
                    );
                    for (i, trial) in block.trials.iter().enumerate() {
                        let layout: Vec<String> = trial
                            .layout()
                            .iter()
                            .map(|(pos, stim, is_target)| {
                                let marker = if *is_target { "*" } else { "" };
                                format!("{pos}={}{marker}", stim.asset_name(&manifest.asset_extension))
                            })
                            .collect();
                        println!("  {i:>3}: {}", layout.join("  "));
                    }
                }
            }
        }
        Commands::Run {
            manifest,
            participant,
            assets,
            output,
            csv,
            realtime,
            accuracy,
            mean_rt_ms,
            sample_hz,
            responder_seed,
        } => {
            let manifest = load_manifest(&manifest)?;
            let profile = ParticipantProfile {
                accuracy,
                mean_rt_ms,
                sample_hz,
                ..ParticipantProfile::default()
            };
            let responder = SimulatedParticipant::new(profile, responder_seed.unwrap_or(participant as u64));

            let log = match (assets, realtime) {
                (Some(dir), realtime) => {
                    let catalog = AssetCatalog::from_dir(&dir)
                        .with_context(|| format!("reading asset directory {}", dir.display()))?;
                    tracing::info!(assets = catalog.len(), dir = %dir.display(), "asset catalog loaded");
                    if realtime {
                        App::new(manifest, participant, HighPrecisionTimer::new(), catalog, responder)?.run()?
                    } else {
                        App::new(manifest, participant, ManualTimer::new(), catalog, responder)?.run()?
                    }
                }
                (None, true) => {
                    App::new(manifest, participant, HighPrecisionTimer::new(), AssumeAllPresent, responder)?.run()?
                }
                (None, false) => {
                    App::new(manifest, participant, ManualTimer::new(), AssumeAllPresent, responder)?.run()?
                }
            };

            let output = output.unwrap_or_else(|| PathBuf::from(format!("participant-{participant}.json")));
            write_outputs(&log, &output, csv.as_deref())?;
        }
    }

    Ok(())
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    Manifest::from_path(path).with_context(|| format!("loading manifest {}", path.display()))
}

fn write_outputs(log: &TrialDataLog, output: &Path, csv: Option<&Path>) -> Result<()> {
    let payload = log.persistence_payload(chrono::Utc::now());
    let json = serde_json::to_string_pretty(&payload)?;
    std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    println!("Results saved to {} ({} trials)", output.display(), payload.total_trials);

    if let Some(path) = csv {
        std::fs::write(path, log.to_csv()?).with_context(|| format!("writing {}", path.display()))?;
        println!("Trial table saved to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "gazex", "run", "m.json", "--participant", "7", "--csv", "out.csv", "--accuracy", "0.9",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                participant,
                csv,
                accuracy,
                realtime,
                ..
            } => {
                assert_eq!(participant, 7);
                assert_eq!(csv, Some(PathBuf::from("out.csv")));
                assert_eq!(accuracy, 0.9);
                assert!(!realtime);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn outputs_are_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("manifest.json");
        std::fs::write(
            &manifest_path,
            r#"{
                "shapes": ["circle"],
                "colors": ["red", "blue"],
                "difficultyLevels": {"easy": ["1.25"]},
                "blocks": 1,
                "trialsPerBlock": 2,
                "constraints": {"noColorRepeatAcrossBlocks": true, "targetRatio": "1.00"}
            }"#,
        )
        .unwrap();

        let manifest = load_manifest(&manifest_path).unwrap();
        let responder = SimulatedParticipant::new(ParticipantProfile::default(), 0);
        let log = App::new(manifest, 0, ManualTimer::new(), AssumeAllPresent, responder)
            .unwrap()
            .run()
            .unwrap();

        let json_path = dir.path().join("out.json");
        let csv_path = dir.path().join("out.csv");
        write_outputs(&log, &json_path, Some(&csv_path)).unwrap();

        let payload: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(payload["totalTrials"], 2);
        assert_eq!(payload["participantId"], 0);
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap().lines().count(), 3);
    }

    #[test]
    fn missing_manifest_reports_path() {
        let err = load_manifest(Path::new("/nonexistent/manifest.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/manifest.json"));
    }
}
