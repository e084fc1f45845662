//! Boolean combination of clause scorers.
//!
//! [`BooleanScorerBuilder`] takes the per-clause scorers of one segment and
//! decides which tree of combinators evaluates them. It holds no iteration
//! state itself.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::query::bulk::{BulkScorer, DefaultBulkScorer};
use crate::query::collector::Collector;
use crate::query::combinator::{CoordinatedScorer, ReqExclScorer, ReqOptScorer, SingleMatchScorer};
use crate::query::conjunction::ConjunctionScorer;
use crate::query::coord::{CoordTable, Coordination, DefaultCoordination};
use crate::query::disjunction::DisjunctionScorer;
use crate::query::explanation::Explanation;
use crate::query::matcher::DocId;
use crate::query::min_should_match::MinShouldMatchScorer;
use crate::query::scorer::{EmptyScorer, Scorer};
use crate::query::windowed::WindowedBooleanScorer;

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
}

/// A clause in a boolean query.
#[derive(Debug)]
pub struct BooleanClause {
    /// The scorer for this clause.
    pub scorer: Box<dyn Scorer>,
    /// The occurrence requirement.
    pub occur: Occur,
}

impl BooleanClause {
    /// Create a new boolean clause.
    pub fn new(scorer: Box<dyn Scorer>, occur: Occur) -> Self {
        BooleanClause { scorer, occur }
    }

    /// Create a MUST clause.
    pub fn must(scorer: Box<dyn Scorer>) -> Self {
        BooleanClause::new(scorer, Occur::Must)
    }

    /// Create a SHOULD clause.
    pub fn should(scorer: Box<dyn Scorer>) -> Self {
        BooleanClause::new(scorer, Occur::Should)
    }

    /// Create a MUST_NOT clause.
    pub fn must_not(scorer: Box<dyn Scorer>) -> Self {
        BooleanClause::new(scorer, Occur::MustNot)
    }
}

/// Builder for the scorer of a boolean query.
///
/// ```
/// use phalanx::query::{BooleanScorerBuilder, TermScorer, collect_doc_ids};
///
/// let mut scorer = BooleanScorerBuilder::new()
///     .must(Box::new(TermScorer::from_docs(vec![1, 2, 3], 1.0)?))
///     .must_not(Box::new(TermScorer::from_docs(vec![2], 1.0)?))
///     .build()?;
///
/// assert_eq!(collect_doc_ids(&mut scorer)?, vec![1, 3]);
/// # Ok::<(), phalanx::error::PhalanxError>(())
/// ```
#[derive(Debug)]
pub struct BooleanScorerBuilder {
    required: Vec<Box<dyn Scorer>>,
    optional: Vec<Box<dyn Scorer>>,
    prohibited: Vec<Box<dyn Scorer>>,
    minimum_should_match: usize,
    coordination: Arc<dyn Coordination>,
    config: EngineConfig,
}

impl BooleanScorerBuilder {
    /// Create a new boolean scorer builder.
    pub fn new() -> Self {
        BooleanScorerBuilder {
            required: Vec::new(),
            optional: Vec::new(),
            prohibited: Vec::new(),
            minimum_should_match: 0,
            coordination: Arc::new(DefaultCoordination),
            config: EngineConfig::default(),
        }
    }

    /// Add a clause.
    pub fn add_clause(mut self, clause: BooleanClause) -> Self {
        match clause.occur {
            Occur::Must => self.required.push(clause.scorer),
            Occur::Should => self.optional.push(clause.scorer),
            Occur::MustNot => self.prohibited.push(clause.scorer),
        }
        self
    }

    /// Add a MUST clause.
    pub fn must(self, scorer: Box<dyn Scorer>) -> Self {
        self.add_clause(BooleanClause::must(scorer))
    }

    /// Add a SHOULD clause.
    pub fn should(self, scorer: Box<dyn Scorer>) -> Self {
        self.add_clause(BooleanClause::should(scorer))
    }

    /// Add a MUST_NOT clause.
    pub fn must_not(self, scorer: Box<dyn Scorer>) -> Self {
        self.add_clause(BooleanClause::must_not(scorer))
    }

    /// Set the minimum number of SHOULD clauses that must match.
    pub fn minimum_should_match(mut self, minimum: usize) -> Self {
        self.minimum_should_match = minimum;
        self
    }

    /// Use a different coordination policy.
    pub fn coordination(mut self, coordination: Arc<dyn Coordination>) -> Self {
        self.coordination = coordination;
        self
    }

    /// Set the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the number of clauses with the given occurrence.
    pub fn clause_count(&self, occur: Occur) -> usize {
        match occur {
            Occur::Must => self.required.len(),
            Occur::Should => self.optional.len(),
            Occur::MustNot => self.prohibited.len(),
        }
    }

    fn coord_table(&self) -> CoordTable {
        let max_coord = self.required.len() + self.optional.len();
        if self.config.coord_disabled {
            CoordTable::disabled(max_coord)
        } else {
            CoordTable::new(self.coordination.as_ref(), max_coord)
        }
    }

    /// Whether no document can possibly match.
    fn matches_nothing(&self) -> bool {
        (self.required.is_empty() && self.optional.is_empty())
            || self.optional.len() < self.minimum_should_match
    }

    /// Build a document-at-a-time scorer, usable on its own or nested in
    /// other combinators.
    pub fn build(self) -> Result<Box<dyn Scorer>> {
        self.config.validate()?;

        if self.matches_nothing() {
            log::debug!(
                "boolean with {} required, {} optional (mm {}) matches nothing",
                self.required.len(),
                self.optional.len(),
                self.minimum_should_match
            );
            return Ok(Box::new(EmptyScorer::new()));
        }

        let coord = self.coord_table();
        let mut required = self.required;
        let mut optional = self.optional;
        let prohibited = self.prohibited;
        let mm = self.minimum_should_match;

        if optional.is_empty() && prohibited.is_empty() {
            log::debug!("pure conjunction over {} required clauses", required.len());
            let factor = coord.factor(required.len());
            return Ok(Box::new(ConjunctionScorer::with_coord(required, factor)?));
        }

        if required.is_empty() && prohibited.is_empty() && mm <= 1 && optional.len() > 1 {
            log::debug!("pure disjunction over {} optional clauses", optional.len());
            return Ok(Box::new(DisjunctionScorer::new(optional)?.with_coord(coord)));
        }

        let root: Box<dyn Scorer> = if required.is_empty() {
            let min = mm.max(1);
            let opt = if optional.len() > min {
                log::debug!("{} of {} optional clauses", min, optional.len());
                counting_disjunction(optional, min)?
            } else if optional.len() == 1 {
                log::debug!("single optional clause");
                single(optional.remove(0))
            } else {
                log::debug!("all {} optional clauses required", optional.len());
                counting_conjunction(optional)?
            };
            add_prohibited(opt, prohibited)?
        } else if optional.len() == mm {
            log::debug!(
                "conjunction over {} required and {} optional clauses",
                required.len(),
                optional.len()
            );
            required.append(&mut optional);
            add_prohibited(counting_conjunction(required)?, prohibited)?
        } else {
            let req = if required.len() == 1 {
                single(required.remove(0))
            } else {
                counting_conjunction(required)?
            };
            if mm > 0 {
                log::debug!(
                    "required clauses gated by {} of {} optional clauses",
                    mm,
                    optional.len()
                );
                let gated = ConjunctionScorer::new(vec![req, counting_disjunction(optional, mm)?])?;
                add_prohibited(Box::new(gated), prohibited)?
            } else {
                log::debug!("required clauses with {} optional bonus clauses", optional.len());
                let opt = if optional.len() == 1 {
                    single(optional.remove(0))
                } else {
                    counting_disjunction(optional, 1)?
                };
                Box::new(ReqOptScorer::new(add_prohibited(req, prohibited)?, opt))
            }
        };

        Ok(Box::new(CoordinatedScorer::new(root, coord)))
    }

    /// Build a scorer that pushes all hits into `collector`.
    ///
    /// When the collector tolerates out-of-order hits and the query has only
    /// optional and prohibited clauses with at most one optional match
    /// required, the windowed bucket scorer is used.
    pub fn build_bulk(self, collector: &dyn Collector) -> Result<Box<dyn BulkScorer>> {
        let windowed = collector.accepts_docs_out_of_order()
            && self.required.is_empty()
            && !self.optional.is_empty()
            && self.minimum_should_match <= 1;

        if windowed {
            log::debug!(
                "windowed bulk scorer over {} optional and {} prohibited clauses",
                self.optional.len(),
                self.prohibited.len()
            );
            let coord = self.coord_table();
            let scorer = WindowedBooleanScorer::new(
                self.optional,
                self.prohibited,
                self.minimum_should_match,
                coord,
                &self.config,
            )?;
            return Ok(Box::new(scorer));
        }

        Ok(Box::new(DefaultBulkScorer::new(self.build()?)))
    }

    /// Explain how `doc` scores against the clauses.
    ///
    /// Every clause scorer is moved to `doc`, so the builder is consumed.
    /// The value matches what [`build`](Self::build) scores the document.
    pub fn explain(self, doc: DocId) -> Result<Explanation> {
        self.config.validate()?;
        let coord = self.coord_table();
        let mm = self.minimum_should_match;

        let mut sum_expl = Explanation::new(0.0, "sum of:");
        let mut overlap = 0;
        let mut sum = 0.0f32;
        let mut fail = false;
        let mut should_matched = 0;

        for (i, mut scorer) in self.required.into_iter().enumerate() {
            let e = scorer.explain(doc)?;
            if e.is_match() {
                sum += e.value;
                overlap += 1;
                sum_expl.add_detail(e);
            } else {
                fail = true;
                sum_expl.add_detail(
                    Explanation::no_match(format!("no match on required clause (must #{})", i))
                        .with_detail(e),
                );
            }
        }
        for mut scorer in self.optional {
            let e = scorer.explain(doc)?;
            if e.is_match() {
                sum += e.value;
                overlap += 1;
                should_matched += 1;
                sum_expl.add_detail(e);
            }
        }
        for (i, mut scorer) in self.prohibited.into_iter().enumerate() {
            let e = scorer.explain(doc)?;
            if e.is_match() {
                fail = true;
                sum_expl.add_detail(
                    Explanation::no_match(format!("match on prohibited clause (must_not #{})", i))
                        .with_detail(e),
                );
            }
        }

        if fail {
            sum_expl.matched = false;
            sum_expl.description =
                "Failure to meet condition(s) of required/prohibited clause(s)".to_string();
            return Ok(sum_expl);
        }
        if should_matched < mm {
            sum_expl.matched = false;
            sum_expl.description =
                format!("Failure to match minimum number of optional clauses: {}", mm);
            return Ok(sum_expl);
        }

        sum_expl.matched = overlap > 0;
        sum_expl.value = sum;
        let factor = coord.factor(overlap);
        if factor == 1.0 || !sum_expl.matched {
            return Ok(sum_expl);
        }
        let mut product = Explanation::new(sum * factor, "product of:");
        product.add_detail(sum_expl);
        product.add_detail(Explanation::new(
            factor,
            format!("coord({}/{})", overlap, coord.max_coord()),
        ));
        Ok(product)
    }
}

impl Default for BooleanScorerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn single(scorer: Box<dyn Scorer>) -> Box<dyn Scorer> {
    Box::new(SingleMatchScorer::new(scorer))
}

fn counting_conjunction(scorers: Vec<Box<dyn Scorer>>) -> Result<Box<dyn Scorer>> {
    Ok(Box::new(ConjunctionScorer::new(scorers)?.counting()))
}

fn counting_disjunction(scorers: Vec<Box<dyn Scorer>>, mm: usize) -> Result<Box<dyn Scorer>> {
    if mm > 1 {
        Ok(Box::new(MinShouldMatchScorer::new(scorers, mm)?.counting()))
    } else {
        Ok(Box::new(DisjunctionScorer::new(scorers)?.counting()))
    }
}

fn add_prohibited(
    scorer: Box<dyn Scorer>,
    mut prohibited: Vec<Box<dyn Scorer>>,
) -> Result<Box<dyn Scorer>> {
    let excl: Box<dyn Scorer> = match prohibited.len() {
        0 => return Ok(scorer),
        1 => prohibited.remove(0),
        _ => Box::new(MinShouldMatchScorer::new(prohibited, 1)?),
    };
    Ok(Box::new(ReqExclScorer::new(scorer, excl)))
}
