//! Query evaluation over per-segment posting lists.
//!
//! Leaf [`TermScorer`]s and the phrase scorers walk postings; the
//! combinators merge them into the documents matching a boolean query.
//! [`BooleanScorerBuilder`] picks the combinator tree for a set of clauses.

pub mod boolean;
pub mod bulk;
pub mod collector;
pub mod combinator;
pub mod conjunction;
pub mod coord;
pub mod disjunction;
pub mod explanation;
pub mod matcher;
pub mod min_should_match;
pub mod phrase;
pub mod posting;
pub mod scorer;
pub mod sloppy_phrase;
pub mod term;
pub mod windowed;

pub use self::boolean::{BooleanClause, BooleanScorerBuilder, Occur};
pub use self::bulk::{BulkScorer, DefaultBulkScorer, SearchOutcome, search};
pub use self::collector::{
    AllDocsCollector, Collector, CountCollector, EarlyTerminatingCollector,
};
pub use self::combinator::{CoordinatedScorer, ReqExclScorer, ReqOptScorer, SingleMatchScorer};
pub use self::conjunction::ConjunctionScorer;
pub use self::coord::{
    CoordTable, Coordination, DefaultCoordination, MatchAccumulator, NoCoordination,
};
pub use self::disjunction::{Aggregation, DisjunctionScorer};
pub use self::explanation::Explanation;
pub use self::matcher::{
    DocId, EmptyMatcher, Matcher, NO_MORE_DOCS, UNPOSITIONED, collect_doc_ids,
};
pub use self::min_should_match::MinShouldMatchScorer;
pub use self::phrase::{ExactPhraseScorer, PhraseTerm};
pub use self::posting::{Posting, PostingIterator, VecPostings};
pub use self::scorer::{
    ConstantScorer, DocScorer, EmptyScorer, FnScorer, Scorer, collect_scored,
};
pub use self::sloppy_phrase::SloppyPhraseScorer;
pub use self::term::TermScorer;
pub use self::windowed::WindowedBooleanScorer;

use serde::{Deserialize, Serialize};

/// A collected document and its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The document ID.
    pub doc_id: DocId,
    /// The relevance score.
    pub score: f32,
}
