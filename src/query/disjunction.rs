//! Disjunction (OR) of scorers over a binary min-heap.
//!
//! [`ScorerHeap`] is the shared primitive: a heap of sub-scorers keyed on
//! their current document. [`DisjunctionScorer`] drives it as a plain union,
//! and the minimum-should-match scorer reuses it for its non-reserved
//! sub-scorers. The only thing that varies between users of the heap is how
//! the sub-scorers sitting on a matched document are aggregated.

use crate::error::{PhalanxError, Result};
use crate::query::coord::{CoordTable, MatchAccumulator};
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};
use crate::query::scorer::Scorer;

/// A sub-scorer together with its rank in descending-cost order.
#[derive(Debug)]
pub(crate) struct HeapEntry {
    /// 0 is the costliest sub-scorer of the owning combinator.
    pub(crate) ord: usize,
    pub(crate) scorer: Box<dyn Scorer>,
}

/// Per-document aggregate of the sub-scorers matching one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MatchAggregate {
    pub(crate) sum: f64,
    pub(crate) max: f32,
    pub(crate) count: usize,
}

impl MatchAggregate {
    pub(crate) fn new() -> Self {
        MatchAggregate {
            sum: 0.0,
            max: f32::NEG_INFINITY,
            count: 0,
        }
    }

    #[inline]
    pub(crate) fn add(&mut self, score: f32) {
        self.sum += score as f64;
        self.max = self.max.max(score);
        self.count += 1;
    }
}

/// How the scores of the sub-scorers matching one document are combined.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Aggregation {
    /// Sum of all matching sub-scores.
    #[default]
    SumAndCount,
    /// `max + tie_breaker * (sum - max)`: the best sub-score, plus a share of
    /// the others.
    MaxWithTieBreaker(f32),
}

impl Aggregation {
    pub(crate) fn combine(&self, agg: &MatchAggregate) -> f32 {
        match *self {
            Aggregation::SumAndCount => agg.sum as f32,
            Aggregation::MaxWithTieBreaker(tie_breaker) => {
                if agg.count == 0 {
                    0.0
                } else {
                    agg.max + tie_breaker * (agg.sum as f32 - agg.max)
                }
            }
        }
    }
}

/// Binary min-heap of sub-scorers ordered by current document.
///
/// Entries tied on a document form a connected sub-tree rooted at index 0
/// whenever that document is the minimum, which lets the matches be
/// gathered by walking down from the root.
#[derive(Debug, Default)]
pub(crate) struct ScorerHeap {
    entries: Vec<HeapEntry>,
}

impl ScorerHeap {
    /// Build the heap bottom-up in linear time.
    pub(crate) fn new(entries: Vec<HeapEntry>) -> Self {
        let mut heap = ScorerHeap { entries };
        for i in (0..heap.entries.len() / 2).rev() {
            heap.sift_down(i);
        }
        heap
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current document of the root, or [`NO_MORE_DOCS`] for an empty heap.
    #[inline]
    pub(crate) fn top_doc(&self) -> DocId {
        self.entries
            .first()
            .map_or(NO_MORE_DOCS, |entry| entry.scorer.doc_id())
    }

    /// Step the root forward and restore heap order.
    ///
    /// Returns `false` if the root exhausted and was removed.
    pub(crate) fn next_top(&mut self) -> Result<bool> {
        let Some(top) = self.entries.first_mut() else {
            return Ok(false);
        };
        if top.scorer.next()? == NO_MORE_DOCS {
            self.remove_top();
            Ok(false)
        } else {
            self.sift_down(0);
            Ok(true)
        }
    }

    /// Advance the root to `target` and restore heap order.
    ///
    /// Returns `false` if the root exhausted and was removed.
    pub(crate) fn advance_top(&mut self, target: DocId) -> Result<bool> {
        let Some(top) = self.entries.first_mut() else {
            return Ok(false);
        };
        if top.scorer.advance(target)? == NO_MORE_DOCS {
            self.remove_top();
            Ok(false)
        } else {
            self.sift_down(0);
            Ok(true)
        }
    }

    /// Remove the root: the last entry takes its place and sinks.
    pub(crate) fn remove_top(&mut self) -> Option<HeapEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let entry = self.entries.pop();
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        entry
    }

    /// Remove the entry at heap index `idx`.
    pub(crate) fn remove_at(&mut self, idx: usize) -> HeapEntry {
        let entry = self.entries.swap_remove(idx);
        if idx < self.entries.len() {
            self.sift_up(idx);
            self.sift_down(idx);
        }
        entry
    }

    /// Heap index of the entry with the smallest `ord` (the costliest).
    pub(crate) fn position_of_min_ord(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.ord)
            .map(|(idx, _)| idx)
    }

    /// Score every entry positioned on `doc` into `agg`.
    ///
    /// `doc` must be the root's document.
    pub(crate) fn aggregate_matches(&mut self, doc: DocId, agg: &mut MatchAggregate) -> Result<()> {
        debug_assert_eq!(self.top_doc(), doc);
        self.aggregate_from(0, doc, agg)
    }

    fn aggregate_from(&mut self, idx: usize, doc: DocId, agg: &mut MatchAggregate) -> Result<()> {
        match self.entries.get_mut(idx) {
            Some(entry) if entry.scorer.doc_id() == doc => {
                agg.add(entry.scorer.score()?);
                self.aggregate_from(2 * idx + 1, doc, agg)?;
                self.aggregate_from(2 * idx + 2, doc, agg)
            }
            _ => Ok(()),
        }
    }

    /// Total cost of the entries currently in the heap.
    pub(crate) fn cost(&self) -> u64 {
        self.entries.iter().map(|entry| entry.scorer.cost()).sum()
    }

    #[inline]
    fn doc_at(&self, idx: usize) -> DocId {
        self.entries[idx].scorer.doc_id()
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.entries.len();
        let doc = self.doc_at(idx);
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.doc_at(right) < self.doc_at(left) {
                right
            } else {
                left
            };
            if self.doc_at(child) >= doc {
                break;
            }
            self.entries.swap(idx, child);
            idx = child;
        }
    }

    fn sift_up(&mut self, mut idx: usize) {
        let doc = self.doc_at(idx);
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.doc_at(parent) <= doc {
                break;
            }
            self.entries.swap(idx, parent);
            idx = parent;
        }
    }
}

/// Matches the union of its sub-scorers.
///
/// Every matching document is scored by aggregating the sub-scorers that sit
/// on it, optionally multiplied by a coordination factor looked up from the
/// number of matching sub-scorers.
#[derive(Debug)]
pub struct DisjunctionScorer {
    heap: ScorerHeap,
    doc: DocId,
    cost: u64,
    aggregation: Aggregation,
    coord: Option<CoordTable>,
    counting: bool,
    matchers: usize,
    score: f32,
}

impl DisjunctionScorer {
    /// Create a sum-aggregating disjunction.
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Result<Self> {
        if scorers.is_empty() {
            return Err(PhalanxError::invalid_configuration(
                "a disjunction needs at least one sub-scorer",
            ));
        }

        let entries: Vec<HeapEntry> = scorers
            .into_iter()
            .enumerate()
            .map(|(ord, scorer)| HeapEntry { ord, scorer })
            .collect();
        let heap = ScorerHeap::new(entries);
        let cost = heap.cost();

        Ok(DisjunctionScorer {
            heap,
            doc: UNPOSITIONED,
            cost,
            aggregation: Aggregation::default(),
            coord: None,
            counting: false,
            matchers: 0,
            score: 0.0,
        })
    }

    /// Use a different aggregation of the matching sub-scores.
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Multiply every score by `coord.factor(matching sub-scorers)`.
    pub fn with_coord(mut self, coord: CoordTable) -> Self {
        self.coord = Some(coord);
        self
    }

    /// Report the matching sub-scorers when scored for coordination.
    pub(crate) fn counting(mut self) -> Self {
        self.counting = true;
        self
    }

    fn after_match(&mut self) -> Result<()> {
        let mut agg = MatchAggregate::new();
        self.heap.aggregate_matches(self.doc, &mut agg)?;
        self.matchers = agg.count;
        self.score = self.aggregation.combine(&agg);
        Ok(())
    }

    fn exhaust(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.matchers = 0;
        self.doc
    }
}

impl Matcher for DisjunctionScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next() on exhausted disjunction");
        loop {
            if !self.heap.next_top()? && self.heap.is_empty() {
                return Ok(self.exhaust());
            }
            let top = self.heap.top_doc();
            if top != self.doc {
                self.doc = top;
                self.after_match()?;
                return Ok(self.doc);
            }
        }
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.doc, "advance({}) from {}", target, self.doc);
        loop {
            if !self.heap.advance_top(target)? && self.heap.is_empty() {
                return Ok(self.exhaust());
            }
            let top = self.heap.top_doc();
            if top >= target {
                self.doc = top;
                self.after_match()?;
                return Ok(self.doc);
            }
        }
    }

    fn cost(&self) -> u64 {
        self.cost
    }
}

impl Scorer for DisjunctionScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(match &self.coord {
            Some(coord) => self.score * coord.factor(self.matchers),
            None => self.score,
        })
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
