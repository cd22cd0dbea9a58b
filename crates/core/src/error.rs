//! Structural errors raised by the value model.
//!
//! These are ordinary `Result` errors, not evaluator failures: the
//! evaluator layer decides whether one becomes a language-level error
//! value. Invariant violations (kind reads on end cells, relative copies
//! without a matching specifier) are bugs and panic instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("series is locked (running or held) and cannot be modified")]
    SeriesLocked,

    #[error("conditional test on a void value")]
    VoidConditional,

    #[error("index {index} out of bounds for series of length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[error("void cannot be inserted into this series")]
    BadVoidInsert,
}
