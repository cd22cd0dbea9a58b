//! Failures: error values and the trap boundary.
//!
//! A failure is a non-returning abort. The error itself is an ordinary
//! value — an error-kind context with `type`, `id`, `message`, `near`,
//! and `where` fields — but the transfer of control is a panic with a
//! marker payload, unwound through every live frame (whose RAII guards
//! release array locks and rebalance the stacks) and caught only at an
//! explicit `Engine::trap` boundary.
//!
//! The error cell itself rides in a thread-local slot rather than the
//! panic payload, which keeps the payload trivially `Send`. Panics that
//! are not failures (invariant bugs) resume unwinding untouched.

use crate::engine::Engine;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind, panic_any, resume_unwind};
use thiserror::Error;
use tracing::debug;
use vessel_core::{Array, Cell, Context, ContextSort, CoreError, KeyList, KindSet, ParamClass, Symbol, Typeset};

thread_local! {
    /// The error value of the failure currently unwinding this thread.
    static FAIL_CELL: RefCell<Option<Cell>> = const { RefCell::new(None) };
}

/// Panic payload marking a failure raised by `fail_with`. The error cell
/// is in `FAIL_CELL`.
struct FailSignal;

/// Host-facing error for `?`-style use around trap results.
#[derive(Debug, Error)]
pub enum VesselError {
    #[error("{message}")]
    Fail { message: String, error: Cell },

    #[error("no catch for throw: {label}")]
    NoCatch { label: Cell },
}

/// Build an error-kind context value.
pub fn make_error(engine: Option<&Engine>, id: &str, message: impl Into<String>) -> Cell {
    let keys = KeyList::new(
        ["type", "id", "message", "near", "where"]
            .into_iter()
            .map(|name| Typeset::key(name, ParamClass::Normal, KindSet::ANY))
            .collect(),
    );
    let ctx = Context::with_keys(ContextSort::Error, keys);
    let where_block = match engine {
        Some(engine) => {
            let labels: Vec<Cell> = engine
                .where_labels()
                .into_iter()
                .map(|label| match label {
                    Some(sym) => Cell::word(sym),
                    None => Cell::blank(),
                })
                .collect();
            Cell::block(Array::from_cells(labels))
        }
        None => Cell::blank(),
    };
    let fields = [
        Cell::word("script"),
        Cell::word(Symbol::intern(id)),
        Cell::text(message.into()),
        Cell::blank(),
        where_block,
    ];
    for (i, field) in fields.into_iter().enumerate() {
        ctx.set(i, field).expect("fresh error context is unlocked");
    }
    Cell::context(ctx)
}

/// The id word of an error value, for matching in handlers and tests.
pub fn error_id(error: &Cell) -> Option<Symbol> {
    let ctx = error.as_context()?;
    ctx.select(Symbol::intern("id"))?.word_symbol()
}

/// The message text of an error value.
pub fn error_message(error: &Cell) -> String {
    error
        .as_context()
        .and_then(|ctx| ctx.select(Symbol::intern("message")))
        .and_then(|msg| msg.as_text().map(str::to_string))
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Abort with an error value. Never returns; lands at the nearest trap.
pub fn fail_with(error: Cell) -> ! {
    debug!(id = ?error_id(&error), "failure raised");
    FAIL_CELL.with(|slot| *slot.borrow_mut() = Some(error));
    panic_any(FailSignal)
}

/// Abort with a fresh error built from an id and message.
pub fn fail(engine: &Engine, id: &str, message: impl Into<String>) -> ! {
    fail_with(make_error(Some(engine), id, message))
}

/// Map a structural `CoreError` into a failure.
pub fn fail_core(engine: &Engine, err: CoreError) -> ! {
    let id = match err {
        CoreError::SeriesLocked => "locked-series",
        CoreError::VoidConditional => "need-value",
        CoreError::OutOfBounds { .. } => "out-of-range",
        CoreError::BadVoidInsert => "bad-void-insert",
    };
    fail(engine, id, err.to_string())
}

impl Engine {
    /// The trap boundary: runs `f`, converting a failure raised inside it
    /// into the error value it carried. Non-failure panics (bugs) resume
    /// unwinding. Engine state is consistent on the error path because
    /// every frame restores its locks and stack marks as it unwinds.
    pub fn trap<T>(&self, f: impl FnOnce(&Engine) -> T) -> Result<T, Cell> {
        match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(value) => Ok(value),
            Err(payload) => {
                if payload.is::<FailSignal>() {
                    let error = FAIL_CELL
                        .with(|slot| slot.borrow_mut().take())
                        .expect("failure signal without an error cell");
                    Err(error)
                } else {
                    resume_unwind(payload)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trap_catches_failures() {
        let engine = Engine::new();
        let result = engine.trap(|engine| -> i32 { fail(engine, "no-value", "word has no value") });
        let error = result.unwrap_err();
        assert_eq!(error_id(&error), Some(Symbol::intern("no-value")));
        assert_eq!(error_message(&error), "word has no value");
    }

    #[test]
    fn test_trap_passes_values_through(){
        let engine = Engine::new();
        let result = engine.trap(|_| 42);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_error_where_captures_frame_labels() {
        let engine = Engine::new();
        engine.infos.borrow_mut().push(crate::engine::FrameInfo {
            label: Some(Symbol::intern("outer")),
        });
        let error = make_error(Some(&engine), "arg-missing", "missing");
        let ctx = error.as_context().unwrap();
        let where_block = ctx.select(Symbol::intern("where")).unwrap();
        let payload = where_block.series_payload().unwrap();
        assert_eq!(payload.array.get(0), Some(Cell::word("outer")));
    }

    #[test]
    #[should_panic(expected = "plain bug")]
    fn test_trap_lets_bug_panics_through() {
        let engine = Engine::new();
        let _ = engine.trap(|_| -> i32 { panic!("plain bug") });
    }
}
