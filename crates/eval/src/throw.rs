//! The throw channel.
//!
//! A throw is a value-bearing non-local return: a *label* cell carrying
//! the `THROWN` flag, and the thrown *argument* stashed in the engine's
//! single thrown slot. Evaluator internals return `Result<_, Thrown>`, so
//! the did-it-throw bit cannot be dropped on the floor; the label and
//! value ride in the engine until something catches, rethrows, or
//! escalates them.
//!
//! Labels in use: blank (a plain `throw`), a word (`throw/name`, and the
//! `break`/`continue`/`quit` protocol words), or a function cell with an
//! exit binding (definitional return).

use crate::engine::Engine;
use tracing::trace;
use vessel_core::{Cell, CellFlags};

/// Marker that an evaluation threw. The label and argument are in the
/// engine's thrown slot.
#[derive(Debug)]
pub struct Thrown;

/// Raise a throw: flag the label, stash label and argument, and hand
/// back the marker for the `Err` channel.
pub(crate) fn throw_cells(engine: &Engine, mut label: Cell, value: Cell) -> Thrown {
    label.set_flag(CellFlags::THROWN);
    trace!(label = %label, "throw raised");
    engine.stash_thrown(label, value);
    Thrown
}

/// Catch the throw in flight: clears the slot and returns the argument,
/// dropping the label. The caller has already matched the label.
pub(crate) fn catch_value(engine: &Engine) -> Cell {
    let (_, value) = engine
        .take_thrown()
        .expect("catch_value with no throw in flight");
    value
}

/// Re-stash a throw taken for inspection (a rethrow).
pub(crate) fn rethrow(engine: &Engine, label: Cell, value: Cell) -> Thrown {
    engine.stash_thrown(label, value);
    Thrown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_carries_thrown_flag() {
        let engine = Engine::new();
        let _marker = throw_cells(&engine, Cell::word("break"), Cell::void());
        let label = engine.thrown_label().unwrap();
        assert!(label.has_flag(CellFlags::THROWN));
        assert_eq!(label, Cell::word("break"));
        assert_eq!(catch_value(&engine), Cell::void());
        assert!(!engine.thrown_pending());
    }

    #[test]
    fn test_rethrow_round_trip() {
        let engine = Engine::new();
        let _ = throw_cells(&engine, Cell::blank(), Cell::integer(3));
        let (label, value) = engine.take_thrown().unwrap();
        let _ = rethrow(&engine, label, value);
        assert!(engine.thrown_pending());
        assert_eq!(catch_value(&engine), Cell::integer(3));
    }
}
