//! Exact phrase matching.
//!
//! Documents are first intersected on id like a conjunction. Each candidate
//! is then verified by counting how often every term occurs at its phrase
//! offset from a common start position. Positions are processed in
//! fixed-width chunks; per chunk, `counts[p]` holds the length of the chain
//! of terms seen so far starting at `p`, and `gens[p]` stamps which chunk
//! pass wrote it so the arrays never need clearing between chunks.

use std::fmt::{self, Debug};

use crate::config::EngineConfig;
use crate::error::{PhalanxError, Result};
use crate::query::explanation::Explanation;
use crate::query::matcher::{DocId, Matcher, NO_MORE_DOCS, UNPOSITIONED};
use crate::query::posting::PostingIterator;
use crate::query::scorer::{DocScorer, Scorer, position_on};

/// One term of a phrase: its postings and its position within the phrase.
#[derive(Debug)]
pub struct PhraseTerm {
    /// Postings of the term, with positions.
    pub postings: Box<dyn PostingIterator>,
    /// Position of the term within the phrase (0 for the first word).
    pub position: i32,
    /// Identity of the term. Sloppy matching uses it to tell apart phrases
    /// that repeat a term, such as "to be or not to be".
    pub term: Option<String>,
}

impl PhraseTerm {
    /// Create a new phrase term.
    pub fn new(postings: Box<dyn PostingIterator>, position: i32) -> Self {
        PhraseTerm {
            postings,
            position,
            term: None,
        }
    }

    /// Tag the term with its text.
    pub fn with_term<S: Into<String>>(mut self, term: S) -> Self {
        self.term = Some(term.into());
        self
    }
}

/// Reject phrases with fewer than two terms or a negative term position.
pub(crate) fn validate_terms(terms: &[PhraseTerm]) -> Result<()> {
    if terms.len() < 2 {
        return Err(PhalanxError::invalid_configuration(format!(
            "a phrase needs at least 2 terms, got {}",
            terms.len()
        )));
    }
    if let Some(term) = terms.iter().find(|term| term.position < 0) {
        return Err(PhalanxError::invalid_configuration(format!(
            "phrase term position must be non-negative, got {}",
            term.position
        )));
    }
    Ok(())
}

#[derive(Debug)]
struct ChunkState {
    postings: Box<dyn PostingIterator>,
    /// Added to every position so that all terms of one occurrence share the
    /// same normalized position.
    offset: i32,
    use_advance: bool,
    pos_upto: i32,
    pos_limit: i32,
    pos: i32,
    last_pos: i32,
}

impl ChunkState {
    /// Read the next raw position and shift it by the phrase offset.
    #[inline]
    fn read_position(&mut self) -> Result<i32> {
        let raw = self.postings.next_position()?;
        if raw < 0 {
            return Err(PhalanxError::posting(format!(
                "negative position {} in doc {}",
                raw,
                self.postings.doc_id()
            )));
        }
        self.offset.checked_add(raw).ok_or_else(|| {
            PhalanxError::posting(format!(
                "position {} in doc {} overflows with phrase offset {}",
                raw,
                self.postings.doc_id(),
                self.offset
            ))
        })
    }

    /// Load the first position of the current document.
    fn reset_positions(&mut self) -> Result<()> {
        self.pos_limit = self.postings.freq()?;
        self.pos = self.read_position()?;
        self.pos_upto = 1;
        self.last_pos = -1;
        Ok(())
    }

    /// Step to the next position. Returns `false` if none are left.
    #[inline]
    fn next_position(&mut self) -> Result<bool> {
        if self.pos_upto >= self.pos_limit {
            return Ok(false);
        }
        self.pos_upto += 1;
        self.pos = self.read_position()?;
        Ok(true)
    }

    /// Chunk-relative slot of the current position, if it lies in the chunk.
    #[inline]
    fn slot(&self, chunk_start: i64) -> Option<usize> {
        let idx = self.pos as i64 - chunk_start;
        (idx >= 0).then_some(idx as usize)
    }
}

/// Matches documents containing the terms at exactly their phrase offsets.
///
/// The score is the leaf [`DocScorer`] applied to the number of phrase
/// occurrences in the document.
pub struct ExactPhraseScorer {
    /// Ordered by ascending cost; `states[0]` leads the intersection.
    states: Vec<ChunkState>,
    doc_scorer: Box<dyn DocScorer>,
    chunk: i64,
    max_next_calls: usize,
    counts: Vec<u32>,
    gens: Vec<u32>,
    generation: u32,
    doc: DocId,
    freq: u32,
    /// A non-leading term had no documents at all.
    no_docs: bool,
}

impl ExactPhraseScorer {
    /// Create a phrase scorer over at least two terms.
    pub fn new(
        mut terms: Vec<PhraseTerm>,
        doc_scorer: Box<dyn DocScorer>,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_terms(&terms)?;

        terms.sort_by_key(|term| (term.postings.cost(), term.position));
        let lead_cost = terms[0].postings.cost();
        let min_position = terms.iter().map(|term| term.position).min().unwrap_or(0);

        let mut no_docs = false;
        let mut states = Vec::with_capacity(terms.len());
        for (i, term) in terms.into_iter().enumerate() {
            let mut postings = term.postings;
            let use_advance =
                postings.cost() > lead_cost.saturating_mul(config.phrase_advance_ratio);
            if i > 0 && !no_docs && postings.next()? == NO_MORE_DOCS {
                no_docs = true;
            }
            let offset = min_position.checked_sub(term.position).ok_or_else(|| {
                PhalanxError::invalid_configuration(format!(
                    "phrase position {} out of range",
                    term.position
                ))
            })?;
            states.push(ChunkState {
                postings,
                offset,
                use_advance,
                pos_upto: 0,
                pos_limit: 0,
                pos: 0,
                last_pos: -1,
            });
        }

        let chunk = config.phrase_chunk_size;
        Ok(ExactPhraseScorer {
            states,
            doc_scorer,
            chunk: chunk as i64,
            max_next_calls: config.phrase_max_next_calls,
            counts: vec![0; chunk],
            gens: vec![0; chunk],
            generation: 0,
            doc: UNPOSITIONED,
            freq: 0,
            no_docs,
        })
    }

    /// Number of phrase occurrences in the current document.
    pub fn phrase_freq(&self) -> u32 {
        self.freq
    }

    fn exhaust(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.freq = 0;
        self.doc
    }

    /// Bring every non-leading term to `doc`.
    ///
    /// Returns the first document a term overshot to, or `None` if all of
    /// them sit on `doc`.
    fn align_followers(&mut self, doc: DocId) -> Result<Option<DocId>> {
        for state in &mut self.states[1..] {
            let mut doc2 = state.postings.doc_id();
            if state.use_advance {
                if doc2 < doc {
                    doc2 = state.postings.advance(doc)?;
                }
            } else {
                let mut calls = 0;
                while doc2 < doc {
                    calls += 1;
                    if calls >= self.max_next_calls {
                        doc2 = state.postings.advance(doc)?;
                        break;
                    }
                    doc2 = state.postings.next()?;
                }
            }
            if doc2 > doc {
                return Ok(Some(doc2));
            }
        }
        Ok(None)
    }

    /// Leapfrog from the lead's `doc` to the next document containing the
    /// phrase.
    fn do_next(&mut self, mut doc: DocId) -> Result<DocId> {
        loop {
            if doc == NO_MORE_DOCS {
                return Ok(self.exhaust());
            }
            match self.align_followers(doc)? {
                Some(NO_MORE_DOCS) => return Ok(self.exhaust()),
                Some(overshoot) => {
                    doc = self.states[0].postings.advance(overshoot)?;
                }
                None => {
                    self.doc = doc;
                    self.freq = self.count_occurrences()?;
                    if self.freq > 0 {
                        return Ok(doc);
                    }
                    doc = self.states[0].postings.next()?;
                }
            }
        }
    }

    fn next_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            log::trace!("phrase generation wrapped, clearing {} slots", self.gens.len());
            self.gens.fill(0);
            self.generation = 1;
        }
    }

    /// Count the phrase occurrences in the current document.
    fn count_occurrences(&mut self) -> Result<u32> {
        for state in &mut self.states {
            state.reset_positions()?;
        }

        let last = self.states.len() - 1;
        let mut freq = 0;
        let mut chunk_start = 0i64;
        let mut end = false;

        while !end {
            self.next_generation();
            let stamp = self.generation;
            let chunk_end = chunk_start + self.chunk;

            // The first term starts a chain at each of its positions.
            let state = &mut self.states[0];
            while (state.pos as i64) < chunk_end {
                if state.pos > state.last_pos {
                    state.last_pos = state.pos;
                    if let Some(idx) = state.slot(chunk_start) {
                        self.counts[idx] = 1;
                        self.gens[idx] = stamp;
                    }
                }
                if !state.next_position()? {
                    end = true;
                    break;
                }
            }

            // Middle terms extend chains of exactly their length.
            let mut any = true;
            for t in 1..last {
                let state = &mut self.states[t];
                any = false;
                while (state.pos as i64) < chunk_end {
                    if state.pos > state.last_pos {
                        state.last_pos = state.pos;
                        match state.slot(chunk_start) {
                            Some(idx) if self.gens[idx] == stamp && self.counts[idx] == t as u32 => {
                                self.counts[idx] += 1;
                                any = true;
                            }
                            _ => {}
                        }
                    }
                    if !state.next_position()? {
                        end = true;
                        break;
                    }
                }
                if !any {
                    break;
                }
            }

            // The last term completes chains.
            if any {
                let state = &mut self.states[last];
                while (state.pos as i64) < chunk_end {
                    if state.pos > state.last_pos {
                        state.last_pos = state.pos;
                        match state.slot(chunk_start) {
                            Some(idx) if self.gens[idx] == stamp && self.counts[idx] == last as u32 => {
                                freq += 1;
                            }
                            _ => {}
                        }
                    }
                    if !state.next_position()? {
                        end = true;
                        break;
                    }
                }
            }

            chunk_start = chunk_end;
        }

        Ok(freq)
    }
}

impl Debug for ExactPhraseScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactPhraseScorer")
            .field("terms", &self.states.len())
            .field("doc", &self.doc)
            .field("freq", &self.freq)
            .field("chunk", &self.chunk)
            .field("doc_scorer", &self.doc_scorer.name())
            .finish()
    }
}

impl Matcher for ExactPhraseScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<DocId> {
        debug_assert!(self.doc != NO_MORE_DOCS, "next() on exhausted phrase");
        if self.no_docs {
            return Ok(self.exhaust());
        }
        let doc = self.states[0].postings.next()?;
        self.do_next(doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(target > self.doc, "advance({}) from {}", target, self.doc);
        if self.no_docs {
            return Ok(self.exhaust());
        }
        let doc = self.states[0].postings.advance(target)?;
        self.do_next(doc)
    }

    fn cost(&self) -> u64 {
        self.states[0].postings.cost()
    }
}

impl Scorer for ExactPhraseScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.doc_scorer.score(self.doc, self.freq as f32))
    }

    fn explain(&mut self, doc: DocId) -> Result<Explanation> {
        if position_on(self, doc)? != doc {
            return Ok(Explanation::no_match(format!("no matching phrase in doc {}", doc)));
        }
        let score = self.score()?;
        Ok(Explanation::new(
            score,
            format!("{} score(doc={}), computed from:", self.doc_scorer.name(), doc),
        )
        .with_detail(Explanation::new(
            self.freq as f32,
            format!("phraseFreq={}", self.freq),
        )))
    }
}
