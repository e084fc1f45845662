//! Sinks fed by query evaluation.
//!
//! A collector is the sink at the end of evaluation. It receives
//! `(doc, score)` pairs and declares whether it can cope with documents
//! arriving out of id order, which decides whether the windowed bulk scorer
//! may be used to feed it.

use std::fmt::Debug;

use crate::error::{PhalanxError, Result};
use crate::query::SearchHit;
use crate::query::matcher::DocId;

/// Receives the hits of a search.
pub trait Collector: Send + Debug {
    /// Collect a document hit.
    ///
    /// Returning [`PhalanxError::CollectionTerminated`] asks the caller to
    /// stop feeding this collector.
    fn collect(&mut self, doc_id: DocId, score: f32) -> Result<()>;

    /// Whether hits may be delivered out of document id order.
    fn accepts_docs_out_of_order(&self) -> bool {
        false
    }
}

impl<C: Collector + ?Sized> Collector for Box<C> {
    fn collect(&mut self, doc_id: DocId, score: f32) -> Result<()> {
        (**self).collect(doc_id, score)
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        (**self).accepts_docs_out_of_order()
    }
}

/// A collector that just counts the number of matching documents.
#[derive(Debug, Default)]
pub struct CountCollector {
    count: u64,
}

impl CountCollector {
    /// Create a new count collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Collector for CountCollector {
    fn collect(&mut self, _doc_id: DocId, _score: f32) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        true
    }
}

/// Keeps every hit it is fed.
#[derive(Debug, Default)]
pub struct AllDocsCollector {
    /// All collected hits, in delivery order.
    hits: Vec<SearchHit>,
    out_of_order: bool,
}

impl AllDocsCollector {
    /// Create a collector that requires in-order delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector that accepts hits in any document order.
    pub fn out_of_order() -> Self {
        AllDocsCollector {
            hits: Vec::new(),
            out_of_order: true,
        }
    }

    /// Hits in the order they were delivered.
    pub fn delivered(&self) -> &[SearchHit] {
        &self.hits
    }

    /// Hits sorted by document id.
    pub fn hits_by_doc(&self) -> Vec<SearchHit> {
        let mut hits = self.hits.clone();
        hits.sort_by_key(|hit| hit.doc_id);
        hits
    }

    /// Number of hits collected.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether no hit was collected.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl Collector for AllDocsCollector {
    fn collect(&mut self, doc_id: DocId, score: f32) -> Result<()> {
        self.hits.push(SearchHit { doc_id, score });
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        self.out_of_order
    }
}

/// Wraps a collector and stops collection once `limit` hits were accepted.
#[derive(Debug)]
pub struct EarlyTerminatingCollector<C> {
    inner: C,
    limit: u64,
    collected: u64,
}

impl<C: Collector> EarlyTerminatingCollector<C> {
    /// Stop after `limit` hits have been forwarded to `inner`.
    pub fn new(inner: C, limit: u64) -> Self {
        EarlyTerminatingCollector {
            inner,
            limit,
            collected: 0,
        }
    }

    /// Number of hits forwarded so far.
    pub fn collected(&self) -> u64 {
        self.collected
    }

    /// The wrapped collector.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap the inner collector.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Collector> Collector for EarlyTerminatingCollector<C> {
    fn collect(&mut self, doc_id: DocId, score: f32) -> Result<()> {
        if self.collected >= self.limit {
            return Err(PhalanxError::CollectionTerminated);
        }
        self.collected += 1;
        self.inner.collect(doc_id, score)
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        self.inner.accepts_docs_out_of_order()
    }
}
