use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;

use gazex_core::Response;
use gazex_experiment::{AssumeAllPresent, ExperimentSession, Manifest};
use gazex_timing::ManualTimer;

/// Manifest with enough blocks and trials that per-trial costs dominate.
fn bench_manifest(trials_per_block: usize) -> Manifest {
    let json = serde_json::json!({
        "shapes": ["circle", "square", "triangle", "diamond", "hexagon"],
        "colors": ["red", "blue", "green", "orange", "purple", "teal", "yellow", "grey"],
        "difficultyLevels": {
            "easy": ["1.40", "1.50", "1.60"],
            "medium": ["1.20", "1.25", "1.30"],
            "hard": ["1.05", "1.10"],
            "extreme": ["1.02", "1.03"]
        },
        "blocks": 4,
        "trialsPerBlock": trials_per_block,
        "constraints": {"noColorRepeatAcrossBlocks": true, "targetRatio": "1.00"}
    });
    Manifest::from_json_str(&json.to_string()).expect("bench manifest is valid")
}

/// Generate-and-respond cycle for a single trial inside a long block.
pub fn bench_trial_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("trial_cycle");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));

    group.bench_function("generate_and_respond", |b| {
        b.iter_batched(
            || {
                let mut session =
                    ExperimentSession::new(bench_manifest(10_000), 17, ManualTimer::new(), AssumeAllPresent)
                        .expect("session");
                session.start_block(0, false).expect("block");
                session
            },
            |mut session| {
                for _ in 0..100 {
                    black_box(session.generate_trial().expect("trial"));
                    session.handle_response(Response::Target).expect("response");
                }
                session
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Full dry-run schedule at several block lengths.
pub fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    for trials in [10usize, 50, 200] {
        let manifest = bench_manifest(trials);
        group.bench_with_input(BenchmarkId::from_parameter(trials), &manifest, |b, manifest| {
            b.iter(|| ExperimentSession::plan(black_box(manifest), black_box(42)).expect("plan"));
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .confidence_level(0.95)
        .noise_threshold(0.02)
        .significance_level(0.05);
    targets = bench_trial_cycle, bench_plan
}

criterion_main!(benches);
