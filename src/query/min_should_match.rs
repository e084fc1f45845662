//! "At least `mm` of `n`" scorer.
//!
//! The `mm - 1` costliest sub-scorers are kept out of the heap in a small
//! reserve. Any match needs at least one heap entry, so candidates always
//! come from the cheap sub-scorers; the reserve is only advanced to
//! candidates and the walk stops as soon as a candidate can no longer reach
//! `mm` matches.

use crate::error::{PhalanxError, Result};
use crate::query::coord::MatchAccumulator;
use crate::query::disjunction::{HeapEntry, MatchAggregate, ScorerHeap};
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};
use crate::query::scorer::Scorer;

/// Matches documents on which at least `mm` sub-scorers are positioned.
///
/// The score is the sum of the matching sub-scores.
#[derive(Debug)]
pub struct MinShouldMatchScorer {
    mm: usize,
    /// Costliest first; the sparsest reserved scorer is last.
    reserve: Vec<HeapEntry>,
    heap: ScorerHeap,
    /// Sub-scorers not yet exhausted, reserve and heap together.
    num_scorers: usize,
    doc: DocId,
    matchers: usize,
    score: f64,
    cost: u64,
    early_abort: bool,
    counting: bool,
}

impl MinShouldMatchScorer {
    /// Create a scorer requiring `mm` of `scorers` to match.
    ///
    /// Needs at least two sub-scorers and `1 <= mm <= scorers.len()`.
    pub fn new(scorers: Vec<Box<dyn Scorer>>, mm: usize) -> Result<Self> {
        if scorers.len() < 2 {
            return Err(PhalanxError::invalid_configuration(format!(
                "minimum-should-match needs at least 2 sub-scorers, got {}",
                scorers.len()
            )));
        }
        if mm == 0 || mm > scorers.len() {
            return Err(PhalanxError::invalid_configuration(format!(
                "minimum-should-match must be in 1..={}, got {}",
                scorers.len(),
                mm
            )));
        }

        let num_scorers = scorers.len();
        let cost = scorers.iter().map(|scorer| scorer.cost()).sum();

        let mut sorted = scorers;
        // Stable: ties keep clause order.
        sorted.sort_by(|a, b| b.cost().cmp(&a.cost()));
        let mut entries: Vec<HeapEntry> = sorted
            .into_iter()
            .enumerate()
            .map(|(ord, scorer)| HeapEntry { ord, scorer })
            .collect();
        let heap_entries = entries.split_off(mm - 1);

        Ok(MinShouldMatchScorer {
            mm,
            reserve: entries,
            heap: ScorerHeap::new(heap_entries),
            num_scorers,
            doc: UNPOSITIONED,
            matchers: 0,
            score: 0.0,
            cost,
            early_abort: true,
            counting: false,
        })
    }

    /// Always walk the whole reserve, even for candidates that cannot reach
    /// the minimum. Results are identical; only slower.
    pub fn without_early_abort(mut self) -> Self {
        self.early_abort = false;
        self
    }

    /// Report the matching sub-scorers when scored for coordination.
    pub(crate) fn counting(mut self) -> Self {
        self.counting = true;
        self
    }

    /// Minimum number of matching sub-scorers.
    pub fn minimum_should_match(&self) -> usize {
        self.mm
    }

    fn exhaust(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.matchers = 0;
        self.doc
    }

    /// Move a freshly exhausted reserve entry out and refill the reserve with
    /// the costliest scorer left in the heap.
    ///
    /// Returns `false` if too few scorers remain to ever match again.
    fn replace_exhausted_reserve(&mut self, idx: usize) -> bool {
        self.num_scorers -= 1;
        if self.num_scorers < self.mm {
            return false;
        }
        self.reserve.remove(idx);
        if let Some(pos) = self.heap.position_of_min_ord() {
            let entry = self.heap.remove_at(pos);
            self.reserve.push(entry);
        }
        debug_assert_eq!(self.reserve.len(), self.mm - 1);
        debug_assert_eq!(self.heap.len() + self.reserve.len(), self.num_scorers);
        true
    }

    /// Take the heap's smallest document as candidate and count its matches.
    ///
    /// Leaves `matchers < mm` when the candidate is rejected, and exhausts
    /// the scorer if too few sub-scorers remain.
    fn evaluate_smallest_doc(&mut self) -> Result<()> {
        self.doc = self.heap.top_doc();
        if self.doc == NO_MORE_DOCS {
            self.exhaust();
            return Ok(());
        }

        let mut agg = MatchAggregate::new();
        self.heap.aggregate_matches(self.doc, &mut agg)?;
        self.matchers = agg.count;
        self.score = agg.sum;

        for i in (0..self.reserve.len()).rev() {
            let entry = &mut self.reserve[i];
            let mut doc = entry.scorer.doc_id();
            let mut advanced = false;
            if doc < self.doc {
                doc = entry.scorer.advance(self.doc)?;
                advanced = true;
            }

            if doc == self.doc {
                self.matchers += 1;
                self.score += entry.scorer.score()? as f64;
                continue;
            }
            if advanced && doc == NO_MORE_DOCS && !self.replace_exhausted_reserve(i) {
                self.exhaust();
                return Ok(());
            }
            // `i` reserve entries are left to check.
            if self.early_abort && self.matchers + i < self.mm {
                return Ok(());
            }
        }
        Ok(())
    }
}

impl Matcher for MinShouldMatchScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next() on exhausted min-should-match");
        loop {
            while self.heap.top_doc() == self.doc {
                if !self.heap.next_top()? {
                    self.num_scorers -= 1;
                    if self.num_scorers < self.mm {
                        return Ok(self.exhaust());
                    }
                }
            }
            self.evaluate_smallest_doc()?;
            if self.doc == NO_MORE_DOCS || self.matchers >= self.mm {
                return Ok(self.doc);
            }
        }
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.doc, "advance({}) from {}", target, self.doc);
        if self.num_scorers < self.mm {
            return Ok(self.exhaust());
        }
        while self.heap.top_doc() < target {
            if !self.heap.advance_top(target)? {
                self.num_scorers -= 1;
                if self.num_scorers < self.mm {
                    return Ok(self.exhaust());
                }
            }
        }
        self.evaluate_smallest_doc()?;
        if self.doc == NO_MORE_DOCS || self.matchers >= self.mm {
            Ok(self.doc)
        } else {
            self.next()
        }
    }

    fn cost(&self) -> u64 {
        self.cost
    }
}

impl Scorer for MinShouldMatchScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score as f32)
    }

    fn matched_subclause_count(&self) -> usize {
        self.matchers
    }

    fn score_counting(&mut self, acc: &mut MatchAccumulator) -> Result<f32> {
        if self.counting {
            acc.add(self.matchers);
        }
        self.score()
    }
}
