//! Sloppy phrase matching.
//!
//! Candidate documents are found by intersecting the terms on document id.
//! Within a candidate, every term's position is shifted by its phrase
//! offset so that an exact occurrence puts all terms on the same phrase
//! position. A min-queue over those shifted positions is then walked: the
//! span between the smallest and the largest position is the match length,
//! and each minimal span within `slop` adds `slop_factor(span)` to the
//! sloppy frequency.
//!
//! A phrase that repeats a term ("to be or not to be") needs the repeats to
//! sit on distinct document positions. Terms sharing an identity form a
//! repeat group; whenever a member lands on a position another member
//! already occupies, the lesser of the two moves on.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt::{self, Debug};

use crate::error::{PhalanxError, Result};
use crate::query::explanation::Explanation;
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};
use crate::query::phrase::{PhraseTerm, validate_terms};
use crate::query::posting::PostingIterator;
use crate::query::scorer::{DocScorer, Scorer, position_on};

/// Position state of one phrase term within the current document.
#[derive(Debug)]
struct PhrasePositions {
    postings: Box<dyn PostingIterator>,
    /// Position of the term within the phrase.
    offset: i32,
    /// Positions left to read in the current document.
    remaining: i32,
    /// Document position minus `offset`.
    position: i32,
    /// Index of the repeat group this term belongs to.
    repeat_group: Option<usize>,
}

impl PhrasePositions {
    fn first_position(&mut self) -> Result<()> {
        self.remaining = self.postings.freq()?;
        self.next_position()?;
        Ok(())
    }

    /// Step to the next position. Returns `false` if none are left.
    fn next_position(&mut self) -> Result<bool> {
        if self.remaining <= 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        let raw = self.postings.next_position()?;
        if raw < 0 {
            return Err(PhalanxError::posting(format!(
                "negative position {} in doc {}",
                raw,
                self.postings.doc_id()
            )));
        }
        self.position = raw - self.offset;
        Ok(true)
    }

    /// Position of the term in the document.
    #[inline]
    fn doc_position(&self) -> i32 {
        self.position + self.offset
    }
}

/// Matches documents containing the terms within `slop` position moves of
/// the phrase.
///
/// The score is the leaf [`DocScorer`] applied to the sloppy frequency.
pub struct SloppyPhraseScorer {
    /// Ordered by ascending cost; `pps[0]` leads the intersection.
    pps: Vec<PhrasePositions>,
    /// Members of each repeat group, ordered by phrase offset.
    repeat_groups: Vec<Vec<usize>>,
    /// Min-queue of `(position, offset, index)`.
    queue: BinaryHeap<Reverse<(i32, i32, usize)>>,
    doc_scorer: Box<dyn DocScorer>,
    slop: i32,
    /// Largest phrase position among the queued terms.
    end: i64,
    doc: DocId,
    sloppy_freq: f32,
    matches: u32,
}

impl SloppyPhraseScorer {
    /// Create a sloppy phrase scorer over at least two terms.
    pub fn new(
        mut terms: Vec<PhraseTerm>,
        slop: i32,
        doc_scorer: Box<dyn DocScorer>,
    ) -> Result<Self> {
        validate_terms(&terms)?;
        if slop < 0 {
            return Err(PhalanxError::invalid_configuration(format!(
                "slop must be non-negative, got {}",
                slop
            )));
        }

        terms.sort_by_key(|term| (term.postings.cost(), term.position));
        let repeat_groups = repeat_groups(&terms);
        if !repeat_groups.is_empty() {
            log::debug!(
                "sloppy phrase with {} repeat group(s) over {} terms",
                repeat_groups.len(),
                terms.len()
            );
        }

        let mut pps: Vec<PhrasePositions> = terms
            .into_iter()
            .map(|term| PhrasePositions {
                postings: term.postings,
                offset: term.position,
                remaining: 0,
                position: 0,
                repeat_group: None,
            })
            .collect();
        for (g, group) in repeat_groups.iter().enumerate() {
            for &idx in group {
                pps[idx].repeat_group = Some(g);
            }
        }

        Ok(SloppyPhraseScorer {
            queue: BinaryHeap::with_capacity(pps.len()),
            pps,
            repeat_groups,
            doc_scorer,
            slop,
            end: i64::MIN,
            doc: UNPOSITIONED,
            sloppy_freq: 0.0,
            matches: 0,
        })
    }

    /// Sloppy frequency of the current document.
    pub fn sloppy_freq(&self) -> f32 {
        self.sloppy_freq
    }

    /// Number of matches within the slop in the current document.
    pub fn match_count(&self) -> u32 {
        self.matches
    }

    /// Maximum number of position moves allowed.
    pub fn slop(&self) -> i32 {
        self.slop
    }

    fn exhaust(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.sloppy_freq = 0.0;
        self.matches = 0;
        self.doc
    }

    /// Leapfrog from the lead's `doc` to the next document matching within
    /// the slop.
    fn do_next(&mut self, mut doc: DocId) -> Result<DocId> {
        'candidates: loop {
            if doc == NO_MORE_DOCS {
                return Ok(self.exhaust());
            }
            for i in 1..self.pps.len() {
                let postings = &mut self.pps[i].postings;
                let mut doc2 = postings.doc_id();
                if doc2 < doc {
                    doc2 = postings.advance(doc)?;
                }
                if doc2 > doc {
                    doc = self.pps[0].postings.advance(doc2)?;
                    continue 'candidates;
                }
            }

            self.doc = doc;
            self.sloppy_freq = self.phrase_freq()?;
            if self.sloppy_freq > 0.0 {
                return Ok(doc);
            }
            doc = self.pps[0].postings.next()?;
        }
    }

    fn push(&mut self, idx: usize) {
        let pp = &self.pps[idx];
        self.queue.push(Reverse((pp.position, pp.offset, idx)));
    }

    fn pop(&mut self) -> Option<usize> {
        self.queue.pop().map(|Reverse((_, _, idx))| idx)
    }

    fn top_position(&self) -> i32 {
        self.queue
            .peek()
            .map_or(i32::MAX, |Reverse((position, _, _))| *position)
    }

    /// Re-key the queue after queued terms were moved.
    fn requeue(&mut self) {
        let queued: Vec<usize> = self
            .queue
            .drain()
            .map(|Reverse((_, _, idx))| idx)
            .collect();
        for idx in queued {
            self.push(idx);
        }
    }

    /// Move a term to its next position and raise `end`.
    fn advance_pp(&mut self, idx: usize) -> Result<bool> {
        if !self.pps[idx].next_position()? {
            return Ok(false);
        }
        self.end = self.end.max(self.pps[idx].position as i64);
        Ok(true)
    }

    /// Another member of `idx`'s repeat group on the same document position.
    fn collide(&self, idx: usize) -> Option<usize> {
        let group = self.pps[idx].repeat_group?;
        let doc_position = self.pps[idx].doc_position();
        self.repeat_groups[group]
            .iter()
            .copied()
            .find(|&other| other != idx && self.pps[other].doc_position() == doc_position)
    }

    /// The term with the smaller position, then the smaller offset.
    fn lesser(&self, a: usize, b: usize) -> usize {
        let (pa, pb) = (&self.pps[a], &self.pps[b]);
        if (pa.position, pa.offset) < (pb.position, pb.offset) {
            a
        } else {
            b
        }
    }

    /// Resolve collisions caused by advancing the dequeued term `idx`.
    ///
    /// Returns `false` once a term runs out of positions.
    fn advance_repeats(&mut self, idx: usize) -> Result<bool> {
        let mut current = idx;
        let mut moved_queued = false;
        while let Some(other) = self.collide(current) {
            current = self.lesser(current, other);
            if !self.advance_pp(current)? {
                return Ok(false);
            }
            if current != idx {
                moved_queued = true;
            }
        }
        if moved_queued {
            self.requeue();
        }
        Ok(true)
    }

    /// Spread every repeat group over distinct positions: the member with
    /// the `j`-th smallest offset skips its first `j` positions.
    fn advance_repeat_groups(&mut self) -> Result<bool> {
        for g in 0..self.repeat_groups.len() {
            for j in 1..self.repeat_groups[g].len() {
                let idx = self.repeat_groups[g][j];
                for _ in 0..j {
                    if !self.pps[idx].next_position()? {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Place every term on its first position of the current document and
    /// fill the queue. Returns `false` if the terms cannot form a match.
    fn init_phrase_positions(&mut self) -> Result<bool> {
        self.end = i64::MIN;
        self.queue.clear();
        for pp in &mut self.pps {
            pp.first_position()?;
        }
        if !self.repeat_groups.is_empty() && !self.advance_repeat_groups()? {
            return Ok(false);
        }
        for idx in 0..self.pps.len() {
            self.end = self.end.max(self.pps[idx].position as i64);
            self.push(idx);
        }
        Ok(true)
    }

    /// Sloppy frequency of the current document.
    ///
    /// Always moves the term with the smallest position, so not every valid
    /// combination of positions is visited.
    fn phrase_freq(&mut self) -> Result<f32> {
        self.matches = 0;
        if !self.init_phrase_positions()? {
            return Ok(0.0);
        }
        let slop = self.slop as i64;
        let mut freq = 0.0;
        let Some(mut pp) = self.pop() else {
            return Ok(0.0);
        };
        let mut match_length = self.end - self.pps[pp].position as i64;
        let mut next = self.top_position();

        while self.advance_pp(pp)? {
            if !self.repeat_groups.is_empty() && !self.advance_repeats(pp)? {
                break;
            }
            if self.pps[pp].position > next {
                if match_length <= slop {
                    freq += self.doc_scorer.slop_factor(match_length as i32);
                    self.matches += 1;
                }
                self.push(pp);
                pp = match self.pop() {
                    Some(idx) => idx,
                    None => break,
                };
                next = self.top_position();
                match_length = self.end - self.pps[pp].position as i64;
            } else {
                match_length = match_length.min(self.end - self.pps[pp].position as i64);
            }
        }
        if match_length <= slop {
            freq += self.doc_scorer.slop_factor(match_length as i32);
            self.matches += 1;
        }
        Ok(freq)
    }
}

/// Group the terms that share an identity at different phrase offsets.
///
/// Each group lists term indexes ordered by phrase offset.
fn repeat_groups(terms: &[PhraseTerm]) -> Vec<Vec<usize>> {
    let mut by_term: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, term) in terms.iter().enumerate() {
        if let Some(text) = term.term.as_deref() {
            by_term.entry(text).or_default().push(idx);
        }
    }

    let mut groups = Vec::new();
    for members in by_term.into_values() {
        let mut grouped = vec![false; members.len()];
        let mut group: Vec<usize> = Vec::new();
        for i in 0..members.len() {
            if grouped[i] {
                continue;
            }
            for j in i + 1..members.len() {
                if grouped[j] || terms[members[i]].position == terms[members[j]].position {
                    continue;
                }
                if !grouped[i] {
                    grouped[i] = true;
                    group.push(members[i]);
                }
                grouped[j] = true;
                group.push(members[j]);
            }
        }
        if !group.is_empty() {
            group.sort_by_key(|&idx| terms[idx].position);
            groups.push(group);
        }
    }
    groups
}

impl Debug for SloppyPhraseScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SloppyPhraseScorer")
            .field("terms", &self.pps.len())
            .field("slop", &self.slop)
            .field("repeat_groups", &self.repeat_groups.len())
            .field("doc", &self.doc)
            .field("sloppy_freq", &self.sloppy_freq)
            .field("doc_scorer", &self.doc_scorer.name())
            .finish()
    }
}

impl Matcher for SloppyPhraseScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next() on exhausted phrase");
        let doc = self.pps[0].postings.next()?;
        self.do_next(doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.doc, "advance({}) from {}", target, self.doc);
        let doc = self.pps[0].postings.advance(target)?;
        self.do_next(doc)
    }

    fn cost(&self) -> u64 {
        self.pps[0].postings.cost()
    }
}

impl Scorer for SloppyPhraseScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.doc_scorer.score(self.doc, self.sloppy_freq))
    }

    fn explain(&mut self, doc: DocId) -> Result<Explanation> {
        if position_on(self, doc)? != doc {
            return Ok(Explanation::no_match(format!(
                "no phrase within slop {} in doc {}",
                self.slop, doc
            )));
        }
        let score = self.score()?;
        Ok(Explanation::new(
            score,
            format!("{} score(doc={}), computed from:", self.doc_scorer.name(), doc),
        )
        .with_detail(Explanation::new(
            self.sloppy_freq,
            format!("phraseFreq={}", self.sloppy_freq),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::collect_doc_ids;
    use crate::query::posting::VecPostings;
    use crate::query::scorer::{ConstantScorer, FnScorer};

    fn term(docs: Vec<(DocId, Vec<i32>)>, position: i32) -> PhraseTerm {
        PhraseTerm::new(
            Box::new(VecPostings::with_positions(docs).unwrap()),
            position,
        )
    }

    fn freq_scorer(terms: Vec<PhraseTerm>, slop: i32) -> SloppyPhraseScorer {
        SloppyPhraseScorer::new(terms, slop, Box::new(FnScorer::new(|_doc, freq| freq))).unwrap()
    }

    #[test]
    fn test_exact_match_counts_one() {
        let mut scorer = freq_scorer(
            vec![term(vec![(0, vec![3])], 0), term(vec![(0, vec![4])], 1)],
            2,
        );

        assert_eq!(scorer.next().unwrap(), 0);
        assert_eq!(scorer.sloppy_freq(), 1.0);
        assert_eq!(scorer.match_count(), 1);
        assert_eq!(scorer.score().unwrap(), 1.0);
    }

    #[test]
    fn test_gap_within_slop() {
        // "a x b" for "a b"~1: one extra move.
        let mut scorer = freq_scorer(
            vec![term(vec![(0, vec![0])], 0), term(vec![(0, vec![2])], 1)],
            1,
        );

        assert_eq!(scorer.next().unwrap(), 0);
        assert_eq!(scorer.sloppy_freq(), 0.5);
    }

    #[test]
    fn test_gap_beyond_slop() {
        let mut scorer = freq_scorer(
            vec![
                term(vec![(0, vec![0]), (1, vec![0])], 0),
                term(vec![(0, vec![3]), (1, vec![1])], 1),
            ],
            1,
        );

        assert_eq!(collect_doc_ids(&mut scorer).unwrap(), vec![1]);
    }

    #[test]
    fn test_reversed_order_needs_two_moves() {
        // "b a" for "a b": a sits one after b, two moves away.
        let docs = || {
            vec![
                term(vec![(0, vec![5])], 0),
                term(vec![(0, vec![4])], 1),
            ]
        };

        let mut scorer = freq_scorer(docs(), 1);
        assert_eq!(scorer.next().unwrap(), NO_MORE_DOCS);

        let mut scorer = freq_scorer(docs(), 2);
        assert_eq!(scorer.next().unwrap(), 0);
        assert!((scorer.sloppy_freq() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_multiple_matches_in_one_doc() {
        // "a b . . a b": two exact matches.
        let mut scorer = freq_scorer(
            vec![
                term(vec![(7, vec![0, 4])], 0),
                term(vec![(7, vec![1, 5])], 1),
            ],
            0,
        );

        assert_eq!(scorer.next().unwrap(), 7);
        assert_eq!(scorer.match_count(), 2);
        assert_eq!(scorer.sloppy_freq(), 2.0);
    }

    #[test]
    fn test_repeated_term_needs_distinct_positions() {
        // "a a" against a document holding a single "a".
        let single = || {
            vec![
                term(vec![(0, vec![3]), (1, vec![3, 5])], 0).with_term("a"),
                term(vec![(0, vec![3]), (1, vec![3, 5])], 1).with_term("a"),
            ]
        };

        let mut scorer = freq_scorer(single(), 2);
        assert_eq!(scorer.next().unwrap(), 1);
        // positions 3 and 5: one extra move.
        assert_eq!(scorer.sloppy_freq(), 0.5);
        assert_eq!(scorer.next().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_untagged_repeats_share_positions() {
        // Without identities the two postings are unrelated terms and may
        // both sit on position 3.
        let mut scorer = freq_scorer(
            vec![
                term(vec![(0, vec![3])], 0),
                term(vec![(0, vec![3])], 1),
            ],
            1,
        );
        assert_eq!(scorer.next().unwrap(), 0);
    }

    #[test]
    fn test_repeat_in_three_term_phrase() {
        // "a b a"~0 against "a b a" and "a b c".
        let a = vec![(0, vec![0, 2]), (1, vec![0])];
        let b = vec![(0, vec![1]), (1, vec![1])];
        let mut scorer = freq_scorer(
            vec![
                term(a.clone(), 0).with_term("a"),
                term(b, 1).with_term("b"),
                term(a, 2).with_term("a"),
            ],
            0,
        );

        assert_eq!(scorer.next().unwrap(), 0);
        assert_eq!(scorer.sloppy_freq(), 1.0);
        assert_eq!(scorer.next().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_repeat_groups_skip_same_offset() {
        let terms = vec![
            term(vec![(0, vec![0])], 0).with_term("a"),
            term(vec![(0, vec![0])], 0).with_term("a"),
            term(vec![(0, vec![1])], 1).with_term("a"),
            term(vec![(0, vec![1])], 1).with_term("b"),
        ];
        assert_eq!(repeat_groups(&terms), vec![vec![0, 2]]);
    }

    #[test]
    fn test_advance_skips_to_target() {
        let docs: Vec<(DocId, Vec<i32>)> = (0..20).map(|doc| (doc, vec![0])).collect();
        let next: Vec<(DocId, Vec<i32>)> = (0..20).map(|doc| (doc, vec![2])).collect();
        let mut scorer = freq_scorer(vec![term(docs, 0), term(next, 1)], 1);

        assert_eq!(scorer.advance(12).unwrap(), 12);
        assert_eq!(scorer.next().unwrap(), 13);
        assert_eq!(scorer.advance(19).unwrap(), 19);
        assert_eq!(scorer.next().unwrap(), NO_MORE_DOCS);
        assert!(scorer.is_exhausted());
    }

    #[test]
    fn test_explain_reports_sloppy_freq() {
        let mut scorer = freq_scorer(
            vec![term(vec![(4, vec![0])], 0), term(vec![(4, vec![2])], 1)],
            3,
        );
        let explanation = scorer.explain(4).unwrap();
        assert!(explanation.is_match());
        assert_eq!(explanation.value, 0.5);
        assert_eq!(explanation.details[0].description, "phraseFreq=0.5");
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let one = vec![term(vec![(0, vec![0])], 0)];
        assert!(SloppyPhraseScorer::new(one, 1, Box::new(ConstantScorer::new(1.0))).is_err());

        let two = vec![term(vec![(0, vec![0])], 0), term(vec![(0, vec![1])], 1)];
        let err = SloppyPhraseScorer::new(two, -1, Box::new(ConstantScorer::new(1.0))).unwrap_err();
        assert!(matches!(err, PhalanxError::InvalidConfiguration(_)));
    }
}
