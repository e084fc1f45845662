//! Coordination: rewarding documents that match more of a query's clauses.
//!
//! The coordination factor is a post-processing step applied by the boolean
//! combinators: the raw summed score of a document is multiplied by a factor
//! looked up from the number of clauses that matched it. The lookup table is
//! precomputed per query from a pluggable [`Coordination`] policy.

use std::fmt::Debug;

/// Policy computing the coordination factor for `overlap` matching clauses
/// out of `max_overlap`.
pub trait Coordination: Send + Sync + Debug {
    /// Factor applied to a document matching `overlap` of `max_overlap` clauses.
    fn coord(&self, overlap: usize, max_overlap: usize) -> f32;
}

/// `overlap / max_overlap`, except that a single-clause query is never
/// penalised.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCoordination;

impl Coordination for DefaultCoordination {
    fn coord(&self, overlap: usize, max_overlap: usize) -> f32 {
        if max_overlap <= 1 {
            1.0
        } else {
            overlap as f32 / max_overlap as f32
        }
    }
}

/// Leaves scores untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCoordination;

impl Coordination for NoCoordination {
    fn coord(&self, _overlap: usize, _max_overlap: usize) -> f32 {
        1.0
    }
}

/// Precomputed coordination factors for 0..=max_coord matching clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordTable {
    factors: Vec<f32>,
}

impl CoordTable {
    /// Build the table for a query with `max_coord` scoring clauses.
    pub fn new(coordination: &dyn Coordination, max_coord: usize) -> Self {
        let factors = (0..=max_coord)
            .map(|overlap| coordination.coord(overlap, max_coord))
            .collect();
        CoordTable { factors }
    }

    /// A table whose every factor is 1.0.
    pub fn disabled(max_coord: usize) -> Self {
        CoordTable {
            factors: vec![1.0; max_coord + 1],
        }
    }

    /// Factor for `overlap` matching clauses.
    #[inline]
    pub fn factor(&self, overlap: usize) -> f32 {
        debug_assert!(
            overlap < self.factors.len(),
            "overlap {} exceeds max coord {}",
            overlap,
            self.factors.len() - 1
        );
        self.factors.get(overlap).copied().unwrap_or(1.0)
    }

    /// Largest overlap this table covers.
    pub fn max_coord(&self) -> usize {
        self.factors.len() - 1
    }
}

/// Per-document count of matching clauses, threaded through
/// [`Scorer::score_counting`](crate::query::scorer::Scorer::score_counting).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchAccumulator {
    matchers: usize,
}

impl MatchAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` more matching clauses.
    #[inline]
    pub fn add(&mut self, count: usize) {
        self.matchers += count;
    }

    /// Matching clauses observed so far.
    #[inline]
    pub fn matchers(&self) -> usize {
        self.matchers
    }
}
