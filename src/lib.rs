//! # Phalanx
//!
//! Query evaluation for an inverted index: given per-term posting
//! iterators for one index segment, compute the documents that match a
//! boolean or phrase query and their scores.
//!
//! ## Features
//!
//! - Leapfrog conjunctions and heap-based disjunctions
//! - Minimum-should-match with early abort
//! - Coordination factors for partially matching boolean queries
//! - Windowed bucket scoring for out-of-order collectors
//! - Exact and sloppy phrase matching over position streams
//! - Score explanations for boolean queries

pub mod config;
pub mod error;
pub mod query;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::{PhalanxError, Result};
    pub use crate::query::{
        BooleanScorerBuilder, BulkScorer, Collector, DocId, ExactPhraseScorer, Explanation,
        Matcher, NO_MORE_DOCS, PhraseTerm, Scorer, SearchHit, SearchOutcome, SloppyPhraseScorer,
        TermScorer, VecPostings, search,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
