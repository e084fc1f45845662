//! Posting sources consumed by the leaf scorers.
//!
//! Real segments supply their own [`PostingIterator`]; [`VecPostings`] is an
//! in-memory posting list used for small indexes, tests and benchmarks.

use crate::error::{PhalanxError, Result};
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};

/// A per-term posting stream: documents, frequencies and positions.
pub trait PostingIterator: Matcher {
    /// Number of occurrences of the term in the current document.
    fn freq(&self) -> Result<i32>;

    /// Next position of the term in the current document.
    ///
    /// May be called at most [`freq`](Self::freq) times per document.
    fn next_position(&mut self) -> Result<i32>;
}

impl<P: PostingIterator + ?Sized> PostingIterator for Box<P> {
    #[inline]
    fn freq(&self) -> Result<i32> {
        (**self).freq()
    }

    #[inline]
    fn next_position(&mut self) -> Result<i32> {
        (**self).next_position()
    }
}

/// One document of an in-memory posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// The document ID.
    pub doc_id: DocId,
    /// Term frequency in the document.
    pub freq: i32,
    /// Sorted term positions (empty when positions are not indexed).
    pub positions: Vec<i32>,
}

/// Posting list backed by a sorted `Vec`. Binary search for advance.
#[derive(Debug, Clone)]
pub struct VecPostings {
    postings: Vec<Posting>,
    /// Index of the current posting, `None` before the first move.
    cursor: Option<usize>,
    doc: DocId,
    position_upto: usize,
}

impl VecPostings {
    /// Create a posting list of documents without positions (frequency 1).
    pub fn new(doc_ids: Vec<DocId>) -> Result<Self> {
        let postings = doc_ids
            .into_iter()
            .map(|doc_id| Posting {
                doc_id,
                freq: 1,
                positions: Vec::new(),
            })
            .collect();
        Self::from_postings(postings)
    }

    /// Create a posting list of `(doc, positions)` pairs.
    ///
    /// The frequency of each document is the number of its positions.
    pub fn with_positions(docs: Vec<(DocId, Vec<i32>)>) -> Result<Self> {
        let postings = docs
            .into_iter()
            .map(|(doc_id, positions)| Posting {
                doc_id,
                freq: positions.len() as i32,
                positions,
            })
            .collect();
        Self::from_postings(postings)
    }

    /// Create a posting list from explicit postings.
    pub fn from_postings(postings: Vec<Posting>) -> Result<Self> {
        let mut last = UNPOSITIONED;
        for posting in &postings {
            if posting.doc_id <= last || posting.doc_id == NO_MORE_DOCS {
                return Err(PhalanxError::invalid_configuration(format!(
                    "posting doc ids must be strictly increasing, non-negative and below NO_MORE_DOCS (got {} after {})",
                    posting.doc_id, last
                )));
            }
            if !posting.positions.is_empty() {
                if posting.positions.len() as i32 != posting.freq {
                    return Err(PhalanxError::invalid_configuration(format!(
                        "doc {} has {} positions but freq {}",
                        posting.doc_id,
                        posting.positions.len(),
                        posting.freq
                    )));
                }
                if posting.positions.windows(2).any(|w| w[0] > w[1]) {
                    return Err(PhalanxError::invalid_configuration(format!(
                        "positions of doc {} must be sorted",
                        posting.doc_id
                    )));
                }
                if posting.positions[0] < 0 {
                    return Err(PhalanxError::invalid_configuration(format!(
                        "positions of doc {} must be non-negative, got {}",
                        posting.doc_id, posting.positions[0]
                    )));
                }
            }
            last = posting.doc_id;
        }

        Ok(VecPostings {
            postings,
            cursor: None,
            doc: UNPOSITIONED,
            position_upto: 0,
        })
    }

    /// Number of documents in this posting list.
    pub fn doc_freq(&self) -> usize {
        self.postings.len()
    }

    fn current(&self) -> Result<&Posting> {
        self.cursor
            .and_then(|idx| self.postings.get(idx))
            .ok_or_else(|| PhalanxError::posting("posting list is not positioned on a document"))
    }

    fn move_to(&mut self, idx: usize) -> DocId {
        self.cursor = Some(idx);
        self.position_upto = 0;
        self.doc = self
            .postings
            .get(idx)
            .map(|posting| posting.doc_id)
            .unwrap_or(NO_MORE_DOCS);
        self.doc
    }
}

impl Matcher for VecPostings {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next() called on exhausted postings");
        let idx = self.cursor.map_or(0, |idx| idx + 1);
        Ok(self.move_to(idx))
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.doc, "advance({}) from doc {}", target, self.doc);
        let start = self.cursor.map_or(0, |idx| idx + 1).min(self.postings.len());
        let offset = match self.postings[start..].binary_search_by(|p| p.doc_id.cmp(&target)) {
            Ok(offset) | Err(offset) => offset,
        };
        Ok(self.move_to(start + offset))
    }

    fn cost(&self) -> u64 {
        self.postings.len() as u64
    }
}

impl PostingIterator for VecPostings {
    fn freq(&self) -> Result<i32> {
        Ok(self.current()?.freq)
    }

    fn next_position(&mut self) -> Result<i32> {
        let upto = self.position_upto;
        let position = *self.current()?.positions.get(upto).ok_or_else(|| {
            PhalanxError::posting(format!(
                "read past the last position of doc {}",
                self.doc
            ))
        })?;
        self.position_upto += 1;
        Ok(position)
    }
}
