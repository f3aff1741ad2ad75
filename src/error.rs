//! Engine error taxonomy.
//!
//! Only input-validation problems and internal invariant breaches surface
//! as `Err`. Data-quality problems (missing geometry, an empty category)
//! degrade locally into failure codes inside the normal result structure
//! so one unmeasurable device never blocks unrelated configurations.

use crate::catalog::ConicalLevel;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed request shape (too few slots, unknown catalog id in a
    /// resolved reference, and similar). Fatal for the request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two resolved devices declared at the same conical level; ties are
    /// never auto-broken.
    #[error("devices '{a}' and '{b}' both declare conical level {level}")]
    TiedConicalLevels {
        a: String,
        b: String,
        level: ConicalLevel,
    },

    /// The decision table has no row for this combination; treated as
    /// input validation, never a default guess.
    #[error("no decision rule for outcome={outcome}, device_count={device_count}, framing={framing}")]
    UnroutableDecision {
        outcome: String,
        device_count: usize,
        framing: String,
    },

    /// Neither the precise table nor the broad level fallback matched any
    /// device. Callers signal discovery exhaustion instead of surfacing
    /// this directly.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// Generator and analyzer disagree on configuration shape. A defect,
    /// not bad input; never retried.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
