//! Windowed boolean evaluation over a bucket table.
//!
//! Instead of iterating sub-scorers in lock step, every sub-scorer pushes
//! all its hits inside a fixed-width window of document ids into a hash
//! table of buckets. Documents collide only across windows, so one slot per
//! document is enough within a window. Once the window is full the touched
//! buckets are walked, filtered and emitted, in bucket-list order rather
//! than document order.

use crate::config::EngineConfig;
use crate::error::{PhalanxError, Result};
use crate::query::bulk::{BulkScorer, DefaultBulkScorer};
use crate::query::collector::Collector;
use crate::query::coord::CoordTable;
use crate::query::matcher::{DocId, UNPOSITIONED};
use crate::query::scorer::Scorer;

/// Bit set on buckets hit by a prohibited clause.
const PROHIBITED_MASK: u32 = 1;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Document this bucket currently accumulates; stale when it differs
    /// from the document being collected.
    doc: DocId,
    score: f64,
    bits: u32,
    /// Number of clauses that hit `doc`.
    coord: usize,
    /// Next bucket in the list of buckets touched this window.
    next: Option<usize>,
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket {
            doc: UNPOSITIONED,
            score: 0.0,
            bits: 0,
            coord: 0,
            next: None,
        }
    }
}

#[derive(Debug)]
struct BucketTable {
    buckets: Vec<Bucket>,
    mask: usize,
    /// Head of the list of buckets touched since the last reset.
    first: Option<usize>,
}

impl BucketTable {
    fn new(size: usize) -> Self {
        BucketTable {
            buckets: vec![Bucket::default(); size],
            mask: size - 1,
            first: None,
        }
    }

    #[inline]
    fn collect(&mut self, doc: DocId, score: f32, mask: u32) {
        let slot = doc as usize & self.mask;
        let bucket = &mut self.buckets[slot];
        if bucket.doc != doc {
            *bucket = Bucket {
                doc,
                score: score as f64,
                bits: mask,
                coord: 1,
                next: self.first,
            };
            self.first = Some(slot);
        } else {
            bucket.score += score as f64;
            bucket.bits |= mask;
            bucket.coord += 1;
        }
    }
}

/// Collector that drops a sub-scorer's hits into the shared bucket table.
#[derive(Debug)]
struct BucketCollector<'a> {
    table: &'a mut BucketTable,
    mask: u32,
    collected: u64,
}

impl Collector for BucketCollector<'_> {
    fn collect(&mut self, doc_id: DocId, score: f32) -> Result<()> {
        self.table.collect(doc_id, score, self.mask);
        self.collected += 1;
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct SubScorer {
    bulk: Box<dyn BulkScorer>,
    mask: u32,
    more: bool,
}

/// Top-level bulk scorer for a boolean query with optional and prohibited
/// clauses only.
///
/// A document is emitted when no prohibited clause matched it and at least
/// `mm` optional clauses did, scored as the sum of the optional scores times
/// the coordination factor. Hits within one window arrive in no particular
/// document order, so only collectors that accept out-of-order documents
/// can be fed from it.
#[derive(Debug)]
pub struct WindowedBooleanScorer {
    table: BucketTable,
    subs: Vec<SubScorer>,
    mm: usize,
    coord: CoordTable,
    window: DocId,
    /// Exclusive upper bound of the last window filled.
    end: DocId,
    /// Buckets still to be walked before the next window is filled.
    current: Option<usize>,
}

impl WindowedBooleanScorer {
    /// Create the scorer.
    ///
    /// `coord` must cover `optional.len()` matching clauses.
    pub fn new(
        optional: Vec<Box<dyn Scorer>>,
        prohibited: Vec<Box<dyn Scorer>>,
        mm: usize,
        coord: CoordTable,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        if optional.is_empty() {
            return Err(PhalanxError::invalid_configuration(
                "windowed boolean scorer needs at least one optional clause",
            ));
        }
        if mm > optional.len() {
            return Err(PhalanxError::invalid_configuration(format!(
                "minimum-should-match {} exceeds {} optional clauses",
                mm,
                optional.len()
            )));
        }
        if coord.max_coord() < optional.len() {
            return Err(PhalanxError::invalid_configuration(format!(
                "coord table covers {} clauses, need {}",
                coord.max_coord(),
                optional.len()
            )));
        }

        let optional = optional.into_iter().map(|scorer| (scorer, 0));
        let prohibited = prohibited
            .into_iter()
            .map(|scorer| (scorer, PROHIBITED_MASK));
        let subs = optional
            .chain(prohibited)
            .map(|(scorer, mask)| SubScorer {
                bulk: Box::new(DefaultBulkScorer::new(scorer)) as Box<dyn BulkScorer>,
                mask,
                more: true,
            })
            .collect();

        Ok(WindowedBooleanScorer {
            table: BucketTable::new(config.bucket_table_size),
            subs,
            mm,
            coord,
            window: config.bucket_table_size as DocId,
            end: 0,
            current: None,
        })
    }

    /// Walk the pending buckets, emitting the ones below `max` and keeping
    /// the rest for a later call.
    fn emit_pending(&mut self, collector: &mut dyn Collector, max: DocId) -> Result<()> {
        while let Some(idx) = self.current {
            let bucket = self.table.buckets[idx];
            if bucket.bits & PROHIBITED_MASK == 0 {
                if bucket.doc >= max {
                    self.table.buckets[idx].next = self.table.first;
                    self.table.first = Some(idx);
                    self.current = bucket.next;
                    continue;
                }
                if bucket.coord >= self.mm {
                    let score = bucket.score * self.coord.factor(bucket.coord) as f64;
                    // Pop before collecting so a terminated collection can
                    // resume after this bucket.
                    self.current = bucket.next;
                    collector.collect(bucket.doc, score as f32)?;
                    continue;
                }
            }
            self.current = bucket.next;
        }
        Ok(())
    }

    /// Let every live sub-scorer fill the next window.
    ///
    /// Returns whether any sub-scorer has hits beyond it.
    fn fill_window(&mut self) -> Result<bool> {
        self.end = self.end.saturating_add(self.window);
        let mut more = false;
        let mut filled = 0;
        for sub in self.subs.iter_mut().filter(|sub| sub.more) {
            let mut collector = BucketCollector {
                table: &mut self.table,
                mask: sub.mask,
                collected: 0,
            };
            sub.more = sub.bulk.drain(&mut collector, self.end)?;
            filled += collector.collected;
            more |= sub.more;
        }
        log::trace!(
            "filled window ending at {} with {} hits, more: {}",
            self.end,
            filled,
            more
        );
        Ok(more)
    }
}

impl BulkScorer for WindowedBooleanScorer {
    fn drain(&mut self, collector: &mut dyn Collector, max: DocId) -> Result<bool> {
        loop {
            self.table.first = None;
            self.emit_pending(collector, max)?;

            if let Some(first) = self.table.first.take() {
                self.current = Some(first);
                return Ok(true);
            }

            let more = self.fill_window()?;
            self.current = self.table.first;
            if self.current.is_none() && !more {
                return Ok(false);
            }
        }
    }
}
