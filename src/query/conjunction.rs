//! Conjunction (AND) of scorers by leapfrog intersection.

use crate::error::{PhalanxError, Result};
use crate::query::coord::MatchAccumulator;
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};
use crate::query::scorer::Scorer;

#[derive(Debug)]
struct DocAndScorer {
    /// Last document the scorer was moved to.
    doc: DocId,
    scorer: Box<dyn Scorer>,
}

/// Matches the documents present in every sub-scorer.
///
/// Sub-scorers are ordered once by ascending cost; the cheapest leads and
/// every other scorer only ever advances to the lead's candidate.
#[derive(Debug)]
pub struct ConjunctionScorer {
    /// `entries[0]` is the lead.
    entries: Vec<DocAndScorer>,
    last_doc: DocId,
    coord: f32,
    /// Whether `score_counting` reports every sub-scorer as a match.
    counting: bool,
}

impl ConjunctionScorer {
    /// Create a conjunction with a coordination multiplier of 1.0.
    pub fn new(scorers: Vec<Box<dyn Scorer>>) -> Result<Self> {
        Self::with_coord(scorers, 1.0)
    }

    /// Create a conjunction whose summed score is multiplied by `coord`.
    pub fn with_coord(scorers: Vec<Box<dyn Scorer>>, coord: f32) -> Result<Self> {
        if scorers.is_empty() {
            return Err(PhalanxError::invalid_configuration(
                "a conjunction needs at least one sub-scorer",
            ));
        }

        let mut entries: Vec<DocAndScorer> = scorers
            .into_iter()
            .map(|scorer| DocAndScorer {
                doc: scorer.doc_id(),
                scorer,
            })
            .collect();
        // Stable: equal costs keep clause order.
        entries.sort_by_key(|entry| entry.scorer.cost());

        Ok(ConjunctionScorer {
            entries,
            last_doc: UNPOSITIONED,
            coord,
            counting: false,
        })
    }

    /// Report every sub-scorer as a matching clause when scored for
    /// coordination.
    pub(crate) fn counting(mut self) -> Self {
        self.counting = true;
        self
    }

    /// Number of sub-scorers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a conjunction has at least one sub-scorer.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bring every follower onto the lead's document, leapfrogging the lead
    /// forward whenever a follower overshoots.
    fn do_next(&mut self, mut doc: DocId) -> Result<DocId> {
        'advance_head: loop {
            if doc == NO_MORE_DOCS {
                return Ok(NO_MORE_DOCS);
            }
            for i in 1..self.entries.len() {
                let entry = &mut self.entries[i];
                // Followers sit at or before the candidate here.
                if entry.doc < doc {
                    entry.doc = entry.scorer.advance(doc)?;
                    if entry.doc > doc {
                        doc = entry.doc;
                        let lead = &mut self.entries[0];
                        lead.doc = lead.scorer.advance(doc)?;
                        doc = lead.doc;
                        continue 'advance_head;
                    }
                }
            }
            return Ok(doc);
        }
    }
}

impl Matcher for ConjunctionScorer {
    fn doc_id(&self) -> DocId {
        self.last_doc
    }

    fn next(&mut self) -> Result<DocId> {
        debug_assert!(self.last_doc != NO_MORE_DOCS, "next() on exhausted conjunction");
        let lead = &mut self.entries[0];
        lead.doc = lead.scorer.next()?;
        let doc = lead.doc;
        self.last_doc = self.do_next(doc)?;
        Ok(self.last_doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.last_doc, "advance({}) from {}", target, self.last_doc);
        let lead = &mut self.entries[0];
        lead.doc = if lead.doc < target {
            lead.scorer.advance(target)?
        } else {
            lead.doc
        };
        let doc = lead.doc;
        self.last_doc = self.do_next(doc)?;
        Ok(self.last_doc)
    }

    fn cost(&self) -> u64 {
        self.entries[0].scorer.cost()
    }
}

impl Scorer for ConjunctionScorer {
    fn score(&mut self) -> Result<f32> {
        self.score_counting(&mut MatchAccumulator::new())
    }

    fn matched_subclause_count(&self) -> usize {
        self.entries.len()
    }

    fn score_counting(&mut self, acc: &mut MatchAccumulator) -> Result<f32> {
        let mut sum = 0.0f64;
        for entry in &mut self.entries {
            sum += entry.scorer.score_counting(acc)? as f64;
        }
        if self.counting {
            acc.add(self.entries.len());
        }
        Ok(sum as f32 * self.coord)
    }
}
