//! Benchmarks for weight composition and conversation generation

use chatgen::{
    sample_cell, Cell, ChatgenConfig, ConversationGenerator, Corpus, PresenceMatrix, Record, Tier,
    WalkState, WeightComposer, WeightingConfig,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Corpus with `width` records per tier, each B/C record parented to the
/// record in the same slot one tier up.
fn create_corpus(width: usize) -> Corpus {
    let tiers = Tier::ALL.map(|tier| {
        (0..width)
            .map(|slot| {
                let parent = match tier {
                    Tier::B => format!("A{}", slot),
                    Tier::C => format!("B{}", slot),
                    _ => String::new(),
                };
                Record::new(format!("{}{}", tier, slot), parent, "question", "answer")
            })
            .collect()
    });
    Corpus::new(tiers)
}

/// Benchmark composing one round for varying corpus widths
fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");

    for &width in &[8, 64, 512] {
        let corpus = create_corpus(width);
        let presence = PresenceMatrix::from_corpus(&corpus).unwrap();
        let composer = WeightComposer::new(WeightingConfig::default());
        let state = WalkState::Following(Cell::new(Tier::A, 0));
        group.throughput(Throughput::Elements((width * 4) as u64));

        group.bench_function(format!("{}_wide", width), |b| {
            b.iter(|| black_box(composer.compose(&presence, &corpus, 3, state)))
        });
    }

    group.finish();
}

/// Benchmark a single draw
fn bench_sample(c: &mut Criterion) {
    let corpus = create_corpus(64);
    let presence = PresenceMatrix::from_corpus(&corpus).unwrap();
    let composer = WeightComposer::new(WeightingConfig::default());
    let weights = composer
        .compose(&presence, &corpus, 0, WalkState::Opening)
        .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    c.bench_function("sample_cell_64_wide", |b| {
        b.iter(|| black_box(sample_cell(&weights, &mut rng)))
    });
}

/// Benchmark whole runs, serial and parallel
fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let corpus = create_corpus(64);

    for &workers in &[1, 4] {
        let mut config = ChatgenConfig::default();
        config.generation.generate_times = 200;
        config.generation.seed = Some(1);
        config.generation.workers = workers;
        let generator = ConversationGenerator::new(&corpus, &config).unwrap();
        group.throughput(Throughput::Elements(200));

        group.bench_function(format!("{}_workers", workers), |b| {
            b.iter(|| black_box(generator.run()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compose, bench_sample, bench_generate);
criterion_main!(benches);
