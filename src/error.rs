//! Error types for the Phalanx library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`PhalanxError`] enum. Two families of failure are distinguished:
//!
//! - configuration errors, reported immediately when an iterator tree, a
//!   bulk scorer or an [`EngineConfig`](crate::config::EngineConfig) is built;
//! - collaborator failures, propagated unchanged from posting sources.
//!
//! [`PhalanxError::CollectionTerminated`] is not a failure at all: it is the
//! signal a collector raises to stop collection early.
//!
//! # Examples
//!
//! ```
//! use phalanx::error::{PhalanxError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PhalanxError::invalid_configuration("bucket table size must be a power of two"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for Phalanx operations.
#[derive(Error, Debug)]
pub enum PhalanxError {
    /// Invalid construction-time configuration (bad minimum-should-match,
    /// too few sub-iterators, malformed engine settings, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A posting source failed or was driven outside its contract.
    #[error("Posting error: {0}")]
    Posting(String),

    /// A collector asked for collection to stop early.
    #[error("Collection terminated")]
    CollectionTerminated,

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Opaque failure reported by a collaborator
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PhalanxError.
pub type Result<T> = std::result::Result<T, PhalanxError>;

impl PhalanxError {
    /// Create a new invalid configuration error.
    pub fn invalid_configuration<S: Into<String>>(msg: S) -> Self {
        PhalanxError::InvalidConfiguration(msg.into())
    }

    /// Create a new posting error.
    pub fn posting<S: Into<String>>(msg: S) -> Self {
        PhalanxError::Posting(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PhalanxError::Other(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        PhalanxError::Other(format!("Internal error: {}", msg.into()))
    }

    /// Whether this is the early-termination signal rather than a fault.
    pub fn is_collection_terminated(&self) -> bool {
        matches!(self, PhalanxError::CollectionTerminated)
    }
}
