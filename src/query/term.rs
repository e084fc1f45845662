//! Leaf scorer over a single term's postings.

use std::fmt::{self, Debug};

use crate::error::Result;
use crate::query::explanation::Explanation;
use crate::query::matcher::{DocId, Matcher};
use crate::query::posting::{PostingIterator, VecPostings};
use crate::query::scorer::{ConstantScorer, DocScorer, Scorer, position_on};

/// Scores the documents of one posting list with an opaque [`DocScorer`].
pub struct TermScorer {
    postings: Box<dyn PostingIterator>,
    doc_scorer: Box<dyn DocScorer>,
}

impl TermScorer {
    /// Create a new term scorer.
    pub fn new(postings: Box<dyn PostingIterator>, doc_scorer: Box<dyn DocScorer>) -> Self {
        TermScorer {
            postings,
            doc_scorer,
        }
    }

    /// Create a term scorer over in-memory document ids that scores every
    /// match with `score`.
    pub fn from_docs(doc_ids: Vec<DocId>, score: f32) -> Result<Self> {
        Ok(Self::new(
            Box::new(VecPostings::new(doc_ids)?),
            Box::new(ConstantScorer::new(score)),
        ))
    }

    /// Term frequency in the current document.
    pub fn freq(&self) -> Result<i32> {
        self.postings.freq()
    }
}

impl Debug for TermScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermScorer")
            .field("doc", &self.postings.doc_id())
            .field("cost", &self.postings.cost())
            .field("doc_scorer", &self.doc_scorer.name())
            .finish()
    }
}

impl Matcher for TermScorer {
    #[inline]
    fn doc_id(&self) -> DocId {
        self.postings.doc_id()
    }

    #[inline]
    fn next(&mut self) -> Result<DocId> {
        self.postings.next()
    }

    #[inline]
    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.postings.advance(target)
    }

    fn cost(&self) -> u64 {
        self.postings.cost()
    }
}

impl Scorer for TermScorer {
    fn score(&mut self) -> Result<f32> {
        let freq = self.postings.freq()?;
        Ok(self.doc_scorer.score(self.postings.doc_id(), freq as f32))
    }

    fn explain(&mut self, doc: DocId) -> Result<Explanation> {
        if position_on(self, doc)? != doc {
            return Ok(Explanation::no_match(format!("no matching term in doc {}", doc)));
        }
        let freq = self.postings.freq()?;
        let score = self.doc_scorer.score(doc, freq as f32);
        Ok(Explanation::new(
            score,
            format!("{} score(doc={}), computed from:", self.doc_scorer.name(), doc),
        )
        .with_detail(Explanation::new(freq as f32, format!("termFreq={}", freq))))
    }
}
