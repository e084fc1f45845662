//! Small combinator nodes the boolean builder assembles trees from.

use crate::error::Result;
use crate::query::coord::{CoordTable, MatchAccumulator};
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};
use crate::query::scorer::Scorer;

/// Pass-through that counts as one matching clause for coordination.
#[derive(Debug)]
pub struct SingleMatchScorer {
    inner: Box<dyn Scorer>,
}

impl SingleMatchScorer {
    /// Wrap a clause scorer.
    pub fn new(inner: Box<dyn Scorer>) -> Self {
        SingleMatchScorer { inner }
    }
}

impl Matcher for SingleMatchScorer {
    #[inline]
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    #[inline]
    fn next(&mut self) -> Result<DocId> {
        self.inner.next()
    }

    #[inline]
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.inner.advance(target)
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }
}

impl Scorer for SingleMatchScorer {
    fn score(&mut self) -> Result<f32> {
        self.inner.score()
    }

    fn matched_subclause_count(&self) -> usize {
        1
    }

    fn score_counting(&mut self, acc: &mut MatchAccumulator) -> Result<f32> {
        acc.add(1);
        self.inner.score()
    }
}

/// Documents of a required scorer that an excluded scorer does not match.
///
/// Score and match counts come from the required side only.
#[derive(Debug)]
pub struct ReqExclScorer {
    req: Box<dyn Scorer>,
    /// Dropped once exhausted.
    excl: Option<Box<dyn Scorer>>,
    doc: DocId,
}

impl ReqExclScorer {
    /// Create a new exclusion filter.
    pub fn new(req: Box<dyn Scorer>, excl: Box<dyn Scorer>) -> Self {
        ReqExclScorer {
            req,
            excl: Some(excl),
            doc: UNPOSITIONED,
        }
    }

    /// Starting from the required scorer's current document, find the first
    /// one the excluded scorer does not match.
    fn to_non_excluded(&mut self, mut req_doc: DocId) -> Result<DocId> {
        loop {
            if req_doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            let Some(excl) = self.excl.as_mut() else {
                return Ok(req_doc);
            };

            let mut excl_doc = excl.doc_id();
            if excl_doc < req_doc {
                excl_doc = excl.advance(req_doc)?;
                if excl_doc == NO_MORE_DOCS {
                    self.excl = None;
                    return Ok(req_doc);
                }
            }
            if excl_doc > req_doc {
                return Ok(req_doc);
            }
            req_doc = self.req.next()?;
        }
    }
}

impl Matcher for ReqExclScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next() on exhausted exclusion");
        let req_doc = self.req.next()?;
        self.doc = self.to_non_excluded(req_doc)?;
        Ok(self.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.doc, "advance({}) from {}", target, self.doc);
        let req_doc = self.req.advance(target)?;
        self.doc = self.to_non_excluded(req_doc)?;
        Ok(self.doc)
    }

    fn cost(&self) -> u64 {
        self.req.cost()
    }
}

impl Scorer for ReqExclScorer {
    fn score(&mut self) -> Result<f32> {
        self.req.score()
    }

    fn matched_subclause_count(&self) -> usize {
        self.req.matched_subclause_count()
    }

    fn score_counting(&mut self, acc: &mut MatchAccumulator) -> Result<f32> {
        self.req.score_counting(acc)
    }
}

/// A required scorer whose score gets a bonus when an optional scorer also
/// matches.
///
/// Iteration follows the required scorer alone; the optional side is only
/// advanced lazily when a document is scored.
#[derive(Debug)]
pub struct ReqOptScorer {
    req: Box<dyn Scorer>,
    /// Dropped once exhausted.
    opt: Option<Box<dyn Scorer>>,
}

impl ReqOptScorer {
    /// Create a new required-plus-optional scorer.
    pub fn new(req: Box<dyn Scorer>, opt: Box<dyn Scorer>) -> Self {
        ReqOptScorer {
            req,
            opt: Some(opt),
        }
    }

    /// Move the optional side onto the current document if it can get
    /// there. Returns whether it matches the document.
    fn opt_matches(&mut self) -> Result<bool> {
        let doc = self.req.doc_id();
        let Some(opt) = self.opt.as_mut() else {
            return Ok(false);
        };
        let mut opt_doc = opt.doc_id();
        if opt_doc < doc {
            opt_doc = opt.advance(doc)?;
            if opt_doc == NO_MORE_DOCS {
                self.opt = None;
                return Ok(false);
            }
        }
        Ok(opt_doc == doc)
    }
}

impl Matcher for ReqOptScorer {
    #[inline]
    fn doc_id(&self) -> DocId {
        self.req.doc_id()
    }

    #[inline]
    fn next(&mut self) -> Result<DocId> {
        self.req.next()
    }

    #[inline]
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.req.advance(target)
    }

    fn cost(&self) -> u64 {
        self.req.cost()
    }
}

impl Scorer for ReqOptScorer {
    fn score(&mut self) -> Result<f32> {
        self.score_counting(&mut MatchAccumulator::new())
    }

    fn matched_subclause_count(&self) -> usize {
        let doc = self.req.doc_id();
        let opt = match &self.opt {
            Some(opt) if opt.doc_id() == doc => opt.matched_subclause_count(),
            _ => 0,
        };
        self.req.matched_subclause_count() + opt
    }

    fn score_counting(&mut self, acc: &mut MatchAccumulator) -> Result<f32> {
        let req_score = self.req.score_counting(acc)?;
        if !self.opt_matches()? {
            return Ok(req_score);
        }
        match self.opt.as_mut() {
            Some(opt) => Ok(req_score + opt.score_counting(acc)?),
            None => Ok(req_score),
        }
    }
}

/// Root of a coordinated tree: counts the matching clauses of every
/// document and scales its score by the coordination factor.
#[derive(Debug)]
pub struct CoordinatedScorer {
    inner: Box<dyn Scorer>,
    coord: CoordTable,
}

impl CoordinatedScorer {
    /// Wrap the root of a counting tree.
    pub fn new(inner: Box<dyn Scorer>, coord: CoordTable) -> Self {
        CoordinatedScorer { inner, coord }
    }
}

impl Matcher for CoordinatedScorer {
    #[inline]
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    #[inline]
    fn next(&mut self) -> Result<DocId> {
        self.inner.next()
    }

    #[inline]
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.inner.advance(target)
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }
}

impl Scorer for CoordinatedScorer {
    fn score(&mut self) -> Result<f32> {
        let mut acc = MatchAccumulator::new();
        let raw = self.inner.score_counting(&mut acc)?;
        Ok(raw * self.coord.factor(acc.matchers()))
    }

    fn matched_subclause_count(&self) -> usize {
        self.inner.matched_subclause_count()
    }
}
