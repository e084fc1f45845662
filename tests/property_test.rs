//! Property tests comparing the combinators against set arithmetic.

use std::collections::{BTreeMap, BTreeSet};

use phalanx::prelude::*;
use phalanx::query::{
    AllDocsCollector, ConjunctionScorer, ConstantScorer, DisjunctionScorer, MinShouldMatchScorer,
    SloppyPhraseScorer, collect_doc_ids,
};
use proptest::prelude::*;

fn doc_sets(max_lists: usize) -> impl Strategy<Value = Vec<BTreeSet<DocId>>> {
    prop::collection::vec(prop::collection::btree_set(0..300, 0..60), 2..=max_lists)
}

fn scorers(sets: &[BTreeSet<DocId>]) -> Vec<Box<dyn Scorer>> {
    sets.iter()
        .enumerate()
        .map(|(i, set)| {
            let docs = set.iter().copied().collect();
            Box::new(TermScorer::from_docs(docs, (i + 1) as f32).unwrap()) as Box<dyn Scorer>
        })
        .collect()
}

fn match_counts(sets: &[BTreeSet<DocId>]) -> BTreeMap<DocId, usize> {
    let mut counts = BTreeMap::new();
    for set in sets {
        for &doc in set {
            *counts.entry(doc).or_insert(0) += 1;
        }
    }
    counts
}

/// Expected score of every matching document: the sum of the weights
/// `i + 1` of the lists containing it, and the number of such lists.
fn expected_scores(sets: &[BTreeSet<DocId>]) -> BTreeMap<DocId, (f32, usize)> {
    let mut expected = BTreeMap::new();
    for (i, set) in sets.iter().enumerate() {
        for &doc in set {
            let entry = expected.entry(doc).or_insert((0.0, 0));
            entry.0 += (i + 1) as f32;
            entry.1 += 1;
        }
    }
    expected
}

/// Drain a scorer, recording each document with its score and the number of
/// sub-scorers it reports as matching.
fn scored_with_counts<S: Scorer + ?Sized>(scorer: &mut S) -> Vec<(DocId, f32, usize)> {
    let mut hits = Vec::new();
    while scorer.next().unwrap() != NO_MORE_DOCS {
        let score = scorer.score().unwrap();
        hits.push((scorer.doc_id(), score, scorer.matched_subclause_count()));
    }
    hits
}

/// Walk `scorer` with a mix of `next` (step 0) and `advance(current + step)`
/// and check every landing against the sorted `expected` documents.
fn check_walk<M: Matcher + ?Sized>(
    scorer: &mut M,
    expected: &[DocId],
    steps: &[DocId],
) -> std::result::Result<(), TestCaseError> {
    let mut current = -1;
    for &step in steps {
        let (doc, want) = if step == 0 {
            let want = expected.iter().copied().find(|&d| d > current);
            (scorer.next().unwrap(), want)
        } else {
            let target = current + step;
            let want = expected.iter().copied().find(|&d| d >= target);
            (scorer.advance(target).unwrap(), want)
        };
        prop_assert_eq!(doc, want.unwrap_or(NO_MORE_DOCS));
        prop_assert_eq!(scorer.doc_id(), doc);
        if doc == NO_MORE_DOCS {
            prop_assert!(scorer.is_exhausted());
            break;
        }
        prop_assert!(doc > current, "went back from {} to {}", current, doc);
        current = doc;
    }
    Ok(())
}

/// Naive phrase frequency: start positions `p` of `positions[0]` such that
/// every other term `t` occurs at `p + offsets[t]`.
fn naive_phrase_freq(positions: &[&BTreeSet<i32>], offsets: &[i32]) -> u32 {
    positions[0]
        .iter()
        .filter(|&&p| {
            positions[1..]
                .iter()
                .zip(&offsets[1..])
                .all(|(term, &offset)| term.contains(&(p + offset)))
        })
        .count() as u32
}

fn phrase_docs(terms: usize) -> impl Strategy<Value = BTreeMap<DocId, Vec<BTreeSet<i32>>>> {
    prop::collection::btree_map(
        0..50,
        prop::collection::vec(prop::collection::btree_set(0..64, 1..12), terms),
        1..10,
    )
}

fn phrase_scorer(
    docs: &BTreeMap<DocId, Vec<BTreeSet<i32>>>,
    offsets: &[i32],
    config: &EngineConfig,
) -> ExactPhraseScorer {
    let terms = offsets
        .iter()
        .enumerate()
        .map(|(t, &offset)| {
            let postings: Vec<(DocId, Vec<i32>)> = docs
                .iter()
                .map(|(&doc, terms)| (doc, terms[t].iter().copied().collect()))
                .collect();
            PhraseTerm::new(Box::new(VecPostings::with_positions(postings).unwrap()), offset)
        })
        .collect();
    ExactPhraseScorer::new(terms, Box::new(ConstantScorer::new(1.0)), config).unwrap()
}

fn expected_phrase_freqs(
    docs: &BTreeMap<DocId, Vec<BTreeSet<i32>>>,
    offsets: &[i32],
) -> Vec<(DocId, u32)> {
    docs.iter()
        .filter_map(|(&doc, terms)| {
            let positions: Vec<&BTreeSet<i32>> = terms.iter().collect();
            let freq = naive_phrase_freq(&positions, offsets);
            (freq > 0).then_some((doc, freq))
        })
        .collect()
}

fn at_least(sets: &[BTreeSet<DocId>], mm: usize) -> Vec<DocId> {
    match_counts(sets)
        .into_iter()
        .filter(|&(_, count)| count >= mm)
        .map(|(doc, _)| doc)
        .collect()
}

proptest! {
    #[test]
    fn conjunction_is_intersection(sets in doc_sets(5)) {
        let mut scorer = ConjunctionScorer::new(scorers(&sets)).unwrap();
        prop_assert_eq!(collect_doc_ids(&mut scorer).unwrap(), at_least(&sets, sets.len()));
    }

    #[test]
    fn disjunction_is_union(sets in doc_sets(5)) {
        let mut scorer = DisjunctionScorer::new(scorers(&sets)).unwrap();
        prop_assert_eq!(collect_doc_ids(&mut scorer).unwrap(), at_least(&sets, 1));
    }

    #[test]
    fn min_should_match_counts_overlap(sets in doc_sets(6), mm_seed in 1usize..6) {
        let mm = 1 + (mm_seed - 1) % sets.len();
        let mut scorer = MinShouldMatchScorer::new(scorers(&sets), mm).unwrap();
        prop_assert_eq!(collect_doc_ids(&mut scorer).unwrap(), at_least(&sets, mm));
    }

    #[test]
    fn disjunction_scores_sum_contributors(sets in doc_sets(5)) {
        let mut scorer = DisjunctionScorer::new(scorers(&sets)).unwrap();
        let expected = expected_scores(&sets);

        let hits = scored_with_counts(&mut scorer);
        prop_assert_eq!(hits.len(), expected.len());
        for ((doc, score, count), (want_doc, (want_score, want_count))) in hits.iter().zip(&expected) {
            prop_assert_eq!(doc, want_doc);
            prop_assert_eq!(*score, *want_score, "doc {}", doc);
            prop_assert_eq!(count, want_count, "doc {}", doc);
        }
    }

    #[test]
    fn min_should_match_reports_true_overlap(
        sets in doc_sets(6),
        mm_seed in 1usize..6,
        early_abort in any::<bool>(),
    ) {
        let mm = 1 + (mm_seed - 1) % sets.len();
        let mut scorer = MinShouldMatchScorer::new(scorers(&sets), mm).unwrap();
        if !early_abort {
            scorer = scorer.without_early_abort();
        }
        let expected: Vec<(DocId, f32, usize)> = expected_scores(&sets)
            .into_iter()
            .filter(|&(_, (_, count))| count >= mm)
            .map(|(doc, (score, count))| (doc, score, count))
            .collect();

        prop_assert_eq!(scored_with_counts(&mut scorer), expected);
    }

    #[test]
    fn early_abort_does_not_change_results(sets in doc_sets(6), mm_seed in 1usize..6) {
        let mm = 1 + (mm_seed - 1) % sets.len();
        let mut with_abort = MinShouldMatchScorer::new(scorers(&sets), mm).unwrap();
        let mut without_abort = MinShouldMatchScorer::new(scorers(&sets), mm)
            .unwrap()
            .without_early_abort();
        prop_assert_eq!(
            scored_with_counts(&mut with_abort),
            scored_with_counts(&mut without_abort)
        );
    }

    #[test]
    fn conjunction_walk_is_monotonic(
        sets in doc_sets(4),
        steps in prop::collection::vec(0..40, 1..20),
    ) {
        let mut scorer = ConjunctionScorer::new(scorers(&sets)).unwrap();
        check_walk(&mut scorer, &at_least(&sets, sets.len()), &steps)?;
    }

    #[test]
    fn min_should_match_walk_is_monotonic(
        sets in doc_sets(5),
        mm_seed in 1usize..5,
        steps in prop::collection::vec(0..40, 1..20),
    ) {
        let mm = 1 + (mm_seed - 1) % sets.len();
        let mut scorer = MinShouldMatchScorer::new(scorers(&sets), mm).unwrap();
        check_walk(&mut scorer, &at_least(&sets, mm), &steps)?;
    }

    #[test]
    fn phrase_walk_is_monotonic(
        docs in phrase_docs(2),
        steps in prop::collection::vec(0..10, 1..12),
    ) {
        let offsets = [0, 1];
        let mut scorer = phrase_scorer(&docs, &offsets, &EngineConfig::default());
        let expected: Vec<DocId> = expected_phrase_freqs(&docs, &offsets)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect();
        check_walk(&mut scorer, &expected, &steps)?;
    }

    #[test]
    fn disjunction_walk_is_monotonic(
        sets in doc_sets(4),
        steps in prop::collection::vec(0..40, 1..20),
    ) {
        let mut scorer = DisjunctionScorer::new(scorers(&sets)).unwrap();
        check_walk(&mut scorer, &at_least(&sets, 1), &steps)?;
    }

    #[test]
    fn windowed_matches_document_at_a_time(
        optional in doc_sets(4),
        prohibited in prop::collection::vec(prop::collection::btree_set(0..300, 0..20), 0..3),
        mm in 0usize..2,
        table_bits in 1u32..6,
    ) {
        let make = || {
            let config = EngineConfig {
                bucket_table_size: 1 << table_bits,
                ..EngineConfig::default()
            };
            let mut builder = BooleanScorerBuilder::new()
                .minimum_should_match(mm)
                .config(config);
            for scorer in scorers(&optional) {
                builder = builder.should(scorer);
            }
            for scorer in scorers(&prohibited) {
                builder = builder.must_not(scorer);
            }
            builder
        };

        let mut windowed = AllDocsCollector::out_of_order();
        make().build_bulk(&windowed).unwrap().drain_all(&mut windowed).unwrap();
        let mut in_order = AllDocsCollector::new();
        make().build_bulk(&in_order).unwrap().drain_all(&mut in_order).unwrap();

        let excluded = match_counts(&prohibited);
        let expected: Vec<DocId> = at_least(&optional, 1)
            .into_iter()
            .filter(|doc| !excluded.contains_key(doc))
            .collect();

        let windowed_hits = windowed.hits_by_doc();
        let in_order_hits = in_order.hits_by_doc();
        let docs: Vec<DocId> = windowed_hits.iter().map(|h| h.doc_id).collect();
        prop_assert_eq!(&docs, &expected);
        prop_assert_eq!(windowed_hits.len(), in_order_hits.len());
        for (a, b) in windowed_hits.iter().zip(&in_order_hits) {
            prop_assert_eq!(a.doc_id, b.doc_id);
            prop_assert!((a.score - b.score).abs() < 1e-4, "doc {}: {} vs {}", a.doc_id, a.score, b.score);
        }
    }

    #[test]
    fn phrase_freq_matches_naive_count(docs in phrase_docs(2), chunk_bits in 2u32..8) {
        let config = EngineConfig {
            phrase_chunk_size: 1 << chunk_bits,
            ..EngineConfig::default()
        };
        let offsets = [0, 1];
        let mut scorer = phrase_scorer(&docs, &offsets, &config);

        let mut actual = Vec::new();
        while scorer.next().unwrap() != NO_MORE_DOCS {
            actual.push((scorer.doc_id(), scorer.phrase_freq()));
        }
        prop_assert_eq!(actual, expected_phrase_freqs(&docs, &offsets));
    }

    #[test]
    fn three_term_phrase_with_gap_matches_naive_count(
        docs in phrase_docs(3),
        chunk_size in 2usize..=32,
    ) {
        let config = EngineConfig {
            phrase_chunk_size: chunk_size,
            ..EngineConfig::default()
        };
        let offsets = [0, 1, 3];
        let mut scorer = phrase_scorer(&docs, &offsets, &config);

        let mut actual = Vec::new();
        while scorer.next().unwrap() != NO_MORE_DOCS {
            actual.push((scorer.doc_id(), scorer.phrase_freq()));
        }
        prop_assert_eq!(actual, expected_phrase_freqs(&docs, &offsets));
    }

    #[test]
    fn wide_slop_matches_every_doc_with_all_terms(
        docs in phrase_docs(3),
        steps in prop::collection::vec(0..10, 1..12),
    ) {
        let terms = (0..3)
            .map(|t| {
                let postings: Vec<(DocId, Vec<i32>)> = docs
                    .iter()
                    .map(|(&doc, terms)| (doc, terms[t].iter().copied().collect()))
                    .collect();
                PhraseTerm::new(Box::new(VecPostings::with_positions(postings).unwrap()), t as i32)
            })
            .collect();
        let mut scorer =
            SloppyPhraseScorer::new(terms, 200, Box::new(ConstantScorer::new(1.0))).unwrap();

        let expected: Vec<DocId> = docs.keys().copied().collect();
        check_walk(&mut scorer, &expected, &steps)?;
    }
}
