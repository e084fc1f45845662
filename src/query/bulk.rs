//! Bulk scoring: pushing every hit of a scorer into a collector.

use std::fmt::Debug;

use crate::error::{PhalanxError, Result};
use crate::query::collector::Collector;
use crate::query::matcher::{DocId, NO_MORE_DOCS};
use crate::query::scorer::Scorer;

/// Scores a range of documents at once, feeding each hit to a collector.
///
/// Unlike a [`Scorer`], a bulk scorer is not an iterator and cannot be
/// nested inside another combinator.
pub trait BulkScorer: Send + Debug {
    /// Collect the hits with a document id below `max`.
    ///
    /// Returns whether hits at or beyond `max` may remain.
    fn drain(&mut self, collector: &mut dyn Collector, max: DocId) -> Result<bool>;

    /// Collect every remaining hit.
    fn drain_all(&mut self, collector: &mut dyn Collector) -> Result<()> {
        self.drain(collector, NO_MORE_DOCS)?;
        Ok(())
    }
}

impl<B: BulkScorer + ?Sized> BulkScorer for Box<B> {
    fn drain(&mut self, collector: &mut dyn Collector, max: DocId) -> Result<bool> {
        (**self).drain(collector, max)
    }
}

/// Drives a [`Scorer`] document by document, delivering hits in order.
#[derive(Debug)]
pub struct DefaultBulkScorer<S> {
    scorer: S,
}

impl<S: Scorer> DefaultBulkScorer<S> {
    /// Wrap a scorer.
    pub fn new(scorer: S) -> Self {
        DefaultBulkScorer { scorer }
    }

    /// The wrapped scorer.
    pub fn scorer(&self) -> &S {
        &self.scorer
    }
}

impl<S: Scorer> BulkScorer for DefaultBulkScorer<S> {
    fn drain(&mut self, collector: &mut dyn Collector, max: DocId) -> Result<bool> {
        let mut doc = self.scorer.doc_id();
        if doc < 0 {
            doc = self.scorer.next()?;
        }
        while doc < max {
            let score = self.scorer.score()?;
            collector.collect(doc, score)?;
            doc = self.scorer.next()?;
        }
        Ok(doc != NO_MORE_DOCS)
    }
}

/// How a call to [`search`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every hit was delivered.
    Completed,
    /// The collector stopped collection early.
    Terminated,
}

/// Feed every hit of `bulk` to `collector`.
///
/// A collector raising [`PhalanxError::CollectionTerminated`] ends the search
/// normally with [`SearchOutcome::Terminated`]; any other error propagates.
pub fn search(bulk: &mut dyn BulkScorer, collector: &mut dyn Collector) -> Result<SearchOutcome> {
    match bulk.drain_all(collector) {
        Ok(()) => Ok(SearchOutcome::Completed),
        Err(PhalanxError::CollectionTerminated) => {
            log::debug!("collection terminated early");
            Ok(SearchOutcome::Terminated)
        }
        Err(e) => Err(e),
    }
}
