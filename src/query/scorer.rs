//! Scoring traits: the per-posting relevance callback and scored iterators.

use std::fmt::{self, Debug};

use crate::error::{PhalanxError, Result};
use crate::query::coord::MatchAccumulator;
use crate::query::explanation::Explanation;
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};

/// Opaque relevance function supplied per leaf term.
///
/// The engine never looks inside; it only calls [`score`](Self::score) for
/// the document a leaf is positioned on.
pub trait DocScorer: Send + Sync + Debug {
    /// Calculate the score for a document given the term frequency in it.
    fn score(&self, doc_id: DocId, freq: f32) -> f32;

    /// Get the boost factor for this scorer.
    fn boost(&self) -> f32 {
        1.0
    }

    /// Contribution of one sloppy phrase match spanning `distance` extra
    /// positions to the phrase frequency. Exact matches count 1.
    fn slop_factor(&self, distance: i32) -> f32 {
        1.0 / (distance as f32 + 1.0)
    }

    /// Get the name of this scorer.
    fn name(&self) -> &'static str;
}

/// A constant scorer that always returns the same score.
#[derive(Debug, Clone)]
pub struct ConstantScorer {
    /// The constant score value.
    score: f32,
    /// The boost factor.
    boost: f32,
}

impl ConstantScorer {
    /// Create a new constant scorer.
    pub fn new(score: f32) -> Self {
        ConstantScorer { score, boost: 1.0 }
    }

    /// Create a new constant scorer with boost.
    pub fn with_boost(score: f32, boost: f32) -> Self {
        ConstantScorer { score, boost }
    }

    /// Get the constant score value.
    pub fn score_value(&self) -> f32 {
        self.score
    }
}

impl DocScorer for ConstantScorer {
    fn score(&self, _doc_id: DocId, _freq: f32) -> f32 {
        self.score * self.boost
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn name(&self) -> &'static str {
        "Constant"
    }
}

/// Adapts a closure `(doc, freq) -> score` into a [`DocScorer`].
pub struct FnScorer<F> {
    func: F,
}

impl<F> FnScorer<F>
where
    F: Fn(DocId, f32) -> f32 + Send + Sync,
{
    /// Wrap a scoring closure.
    pub fn new(func: F) -> Self {
        FnScorer { func }
    }
}

impl<F> Debug for FnScorer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScorer").finish_non_exhaustive()
    }
}

impl<F> DocScorer for FnScorer<F>
where
    F: Fn(DocId, f32) -> f32 + Send + Sync,
{
    fn score(&self, doc_id: DocId, freq: f32) -> f32 {
        (self.func)(doc_id, freq)
    }

    fn name(&self) -> &'static str {
        "Fn"
    }
}

/// A [`Matcher`] that can score the document it is positioned on.
///
/// `score` and `matched_subclause_count` are only meaningful while the
/// iterator is positioned on a document.
pub trait Scorer: Matcher {
    /// Score of the current document.
    fn score(&mut self) -> Result<f32>;

    /// Number of sub-clauses matching the current document, for explain
    /// tooling. Leaves report 1.
    fn matched_subclause_count(&self) -> usize {
        1
    }

    /// Score the current document while reporting matched clauses into
    /// `acc` for coordination.
    ///
    /// Leaves and nested, independently coordinated trees count nothing
    /// here; the combinator holding them does the counting.
    fn score_counting(&mut self, _acc: &mut MatchAccumulator) -> Result<f32> {
        self.score()
    }

    /// Explain the score of `doc`, moving this scorer onto it.
    ///
    /// Fails if the scorer is already positioned past `doc`.
    fn explain(&mut self, doc: DocId) -> Result<Explanation> {
        let current = position_on(self, doc)?;
        if current == doc {
            Ok(Explanation::new(self.score()?, format!("score(doc={})", doc)))
        } else {
            Ok(Explanation::no_match(format!("no match on doc {}", doc)))
        }
    }
}

/// Move `matcher` to the first document >= `doc` unless it already is there.
pub(crate) fn position_on<M: Matcher + ?Sized>(matcher: &mut M, doc: DocId) -> Result<DocId> {
    let current = matcher.doc_id();
    if current > doc {
        return Err(PhalanxError::other(format!(
            "cannot explain doc {}: already positioned on {}",
            doc, current
        )));
    }
    if current < doc {
        return matcher.advance(doc);
    }
    Ok(current)
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    #[inline]
    fn score(&mut self) -> Result<f32> {
        (**self).score()
    }

    #[inline]
    fn matched_subclause_count(&self) -> usize {
        (**self).matched_subclause_count()
    }

    #[inline]
    fn score_counting(&mut self, acc: &mut MatchAccumulator) -> Result<f32> {
        (**self).score_counting(acc)
    }

    fn explain(&mut self, doc: DocId) -> Result<Explanation> {
        (**self).explain(doc)
    }
}

/// A scorer that matches no documents.
#[derive(Debug, Default)]
pub struct EmptyScorer {
    exhausted: bool,
}

impl EmptyScorer {
    /// Create a new empty scorer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Matcher for EmptyScorer {
    fn doc_id(&self) -> DocId {
        if self.exhausted {
            NO_MORE_DOCS
        } else {
            UNPOSITIONED
        }
    }

    fn next(&mut self) -> Result<DocId> {
        self.exhausted = true;
        Ok(NO_MORE_DOCS)
    }

    fn advance(&mut self, _target: DocId) -> Result<DocId> {
        self.exhausted = true;
        Ok(NO_MORE_DOCS)
    }

    fn cost(&self) -> u64 {
        0
    }
}

impl Scorer for EmptyScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(0.0)
    }

    fn matched_subclause_count(&self) -> usize {
        0
    }
}

/// Drain a scorer into `(doc, score)` pairs.
pub fn collect_scored<S: Scorer + ?Sized>(scorer: &mut S) -> Result<Vec<(DocId, f32)>> {
    let mut hits = Vec::new();
    loop {
        let doc = scorer.next()?;
        if doc == NO_MORE_DOCS {
            return Ok(hits);
        }
        hits.push((doc, scorer.score()?));
    }
}
