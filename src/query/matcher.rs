//! The document iteration contract shared by every node of a query tree.

use std::fmt::Debug;

use crate::error::Result;

/// A document identifier within one index segment.
pub type DocId = i32;

/// Sentinel returned once an iterator has no more documents.
pub const NO_MORE_DOCS: DocId = i32::MAX;

/// Position of an iterator before its first `next`/`advance` call.
///
/// It orders before every real document, which the heap-based combinators
/// rely on to pull all of their sub-iterators forward on the first call.
pub const UNPOSITIONED: DocId = -1;

/// Forward-only cursor over a strictly increasing sequence of document ids.
///
/// States: unpositioned ([`UNPOSITIONED`]) → positioned → exhausted
/// ([`NO_MORE_DOCS`]).
pub trait Matcher: Send + Debug {
    /// Get the current document ID.
    fn doc_id(&self) -> DocId;

    /// Move to the next document, returning it or [`NO_MORE_DOCS`].
    ///
    /// Must not be called once exhausted.
    fn next(&mut self) -> Result<DocId>;

    /// Move to the first document >= `target`, returning it or [`NO_MORE_DOCS`].
    ///
    /// `target` must be greater than the current document.
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    /// Static estimate of the number of matching documents.
    ///
    /// Only used to order sub-iterators, never for correctness.
    fn cost(&self) -> u64;

    /// Check if this matcher is exhausted.
    fn is_exhausted(&self) -> bool {
        self.doc_id() == NO_MORE_DOCS
    }
}

impl<M: Matcher + ?Sized> Matcher for Box<M> {
    #[inline]
    fn doc_id(&self) -> DocId {
        (**self).doc_id()
    }

    #[inline]
    fn next(&mut self) -> Result<DocId> {
        (**self).next()
    }

    #[inline]
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        (**self).advance(target)
    }

    #[inline]
    fn cost(&self) -> u64 {
        (**self).cost()
    }

    #[inline]
    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// A matcher that matches no documents.
#[derive(Debug)]
pub struct EmptyMatcher {
    doc: DocId,
}

impl EmptyMatcher {
    /// Create a new empty matcher.
    pub fn new() -> Self {
        EmptyMatcher { doc: UNPOSITIONED }
    }
}

impl Default for EmptyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for EmptyMatcher {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        self.doc = NO_MORE_DOCS;
        Ok(self.doc)
    }

    fn advance(&mut self, _target: DocId) -> Result<DocId> {
        self.doc = NO_MORE_DOCS;
        Ok(self.doc)
    }

    fn cost(&self) -> u64 {
        0
    }
}

/// Drain a matcher into a vector of document ids.
///
/// Handy for diagnostics and tests; consumes the matcher's remaining documents.
pub fn collect_doc_ids<M: Matcher + ?Sized>(matcher: &mut M) -> Result<Vec<DocId>> {
    let mut docs = Vec::new();
    loop {
        let doc = matcher.next()?;
        if doc == NO_MORE_DOCS {
            return Ok(docs);
        }
        docs.push(doc);
    }
}
