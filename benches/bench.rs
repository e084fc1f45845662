//! Criterion benchmarks for Phalanx query evaluation.
//!
//! Covers the document-at-a-time combinators, the windowed bucket scorer
//! and exact phrase matching over synthetic posting lists.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use phalanx::prelude::*;
use phalanx::query::{
    AllDocsCollector, ConjunctionScorer, ConstantScorer, CountCollector, DisjunctionScorer,
    MinShouldMatchScorer,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

const MAX_DOC: DocId = 100_000;

/// Generate posting lists where each document appears with the given
/// probability.
fn generate_postings(densities: &[f64], seed: u64) -> Vec<Vec<DocId>> {
    let mut rng = StdRng::seed_from_u64(seed);
    densities
        .iter()
        .map(|&density| (0..MAX_DOC).filter(|_| rng.random_bool(density)).collect())
        .collect()
}

fn scorers(postings: &[Vec<DocId>]) -> Vec<Box<dyn Scorer>> {
    postings
        .iter()
        .map(|docs| {
            Box::new(TermScorer::from_docs(docs.clone(), 1.0).unwrap()) as Box<dyn Scorer>
        })
        .collect()
}

fn count_all<S: Scorer + ?Sized>(scorer: &mut S) -> usize {
    let mut count = 0;
    while scorer.next().unwrap() != NO_MORE_DOCS {
        black_box(scorer.score().unwrap());
        count += 1;
    }
    count
}

fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("combinators");
    let postings = generate_postings(&[0.01, 0.1, 0.3, 0.5], 42);
    group.throughput(Throughput::Elements(MAX_DOC as u64));

    group.bench_function("conjunction", |b| {
        b.iter(|| {
            let mut scorer = ConjunctionScorer::new(scorers(&postings)).unwrap();
            black_box(count_all(&mut scorer))
        })
    });

    group.bench_function("disjunction", |b| {
        b.iter(|| {
            let mut scorer = DisjunctionScorer::new(scorers(&postings)).unwrap();
            black_box(count_all(&mut scorer))
        })
    });

    group.bench_function("min_should_match_2", |b| {
        b.iter(|| {
            let mut scorer = MinShouldMatchScorer::new(scorers(&postings), 2).unwrap();
            black_box(count_all(&mut scorer))
        })
    });

    group.bench_function("min_should_match_3_no_early_abort", |b| {
        b.iter(|| {
            let mut scorer = MinShouldMatchScorer::new(scorers(&postings), 3)
                .unwrap()
                .without_early_abort();
            black_box(count_all(&mut scorer))
        })
    });

    group.finish();
}

fn bench_bulk_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_scoring");
    let postings = generate_postings(&[0.05, 0.2, 0.4], 7);
    let prohibited = generate_postings(&[0.02], 8);
    group.throughput(Throughput::Elements(MAX_DOC as u64));

    let builder = || {
        let mut builder = BooleanScorerBuilder::new();
        for scorer in scorers(&postings) {
            builder = builder.should(scorer);
        }
        for scorer in scorers(&prohibited) {
            builder = builder.must_not(scorer);
        }
        builder
    };

    group.bench_function("windowed", |b| {
        b.iter(|| {
            let mut collector = CountCollector::new();
            let windowed = AllDocsCollector::out_of_order();
            let mut bulk = builder().build_bulk(&windowed).unwrap();
            search(&mut bulk, &mut collector).unwrap();
            black_box(collector.count())
        })
    });

    group.bench_function("document_at_a_time", |b| {
        b.iter(|| {
            let mut collector = CountCollector::new();
            let mut bulk = builder().build_bulk(&collector).unwrap();
            search(&mut bulk, &mut collector).unwrap();
            black_box(collector.count())
        })
    });

    group.finish();
}

fn bench_phrase(c: &mut Criterion) {
    let mut group = c.benchmark_group("phrase");
    let mut rng = StdRng::seed_from_u64(3);

    let mut first = Vec::new();
    let mut second = Vec::new();
    for doc in 0..10_000 {
        let positions: Vec<i32> = (0..200).filter(|_| rng.random_bool(0.1)).collect();
        if positions.is_empty() {
            continue;
        }
        let next: Vec<i32> = positions
            .iter()
            .map(|&p| if rng.random_bool(0.3) { p + 1 } else { p + 2 })
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        first.push((doc, positions));
        second.push((doc, next));
    }
    group.throughput(Throughput::Elements(first.len() as u64));

    group.bench_function("exact_phrase_two_terms", |b| {
        b.iter(|| {
            let mut scorer = ExactPhraseScorer::new(
                vec![
                    PhraseTerm::new(
                        Box::new(VecPostings::with_positions(first.clone()).unwrap()),
                        0,
                    ),
                    PhraseTerm::new(
                        Box::new(VecPostings::with_positions(second.clone()).unwrap()),
                        1,
                    ),
                ],
                Box::new(ConstantScorer::new(1.0)),
                &EngineConfig::default(),
            )
            .unwrap();
            black_box(count_all(&mut scorer))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_combinators, bench_bulk_scoring, bench_phrase);
criterion_main!(benches);
