//! Call frames.
//!
//! A frame is the per-call state the evaluator drives: the feed it reads,
//! the output and scratch cells, the specifier for relatively-bound
//! input, mode flags, and — when a function call is in progress — the
//! function being run and its argument row.
//!
//! Frames are plain stack values borrowing the engine. Creation probes
//! recursion depth (the stack-overflow failure), records the data- and
//! chunk-stack marks, and links an info record for error reporting; the
//! `Drop` impl rebalances both stacks to the recorded marks and unlinks,
//! so a fail-unwind restores every invariant a normal return would.

use crate::engine::{Engine, FrameInfo};
use crate::error::{fail, fail_core};
use crate::feed::Feed;
use crate::throw::{Thrown, throw_cells};
use bitflags::bitflags;
use std::sync::Arc;
use tracing::trace;
use vessel_core::{Cell, Context, FuncData, Specifier, Symbol};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EvalFlags: u16 {
        /// Loop to the end of input instead of stopping after one
        /// expression.
        const TO_END = 1 << 0;
        /// Take arguments literally instead of evaluating (apply-only).
        const NO_ARGS_EVALUATE = 1 << 1;
        /// Block the one-cell peek that dispatches lookback functions.
        const NO_LOOKAHEAD = 1 << 2;
        /// The argument row is caller-built; type-check only.
        const EXECUTE_FRAME = 1 << 3;
        /// The feed is variadic (suppresses lookback).
        const VA_LIST = 1 << 4;
        /// This frame is gathering an argument for a lookback call, so a
        /// normal-left enfix function defers to the parent instead of
        /// binding inside the argument.
        const FULFILLING_ENFIX_ARG = 1 << 5;
        /// A native is running; its varlist is write-held.
        const NATIVE_HOLD = 1 << 6;
    }
}

/// Where a call's argument row lives.
pub enum ArgHome {
    /// No call in progress.
    None,
    /// A row on the chunk stack (native, non-durable calls).
    Chunk { base: usize, len: usize },
    /// A reified frame context (interpreted, durable, or caller-built
    /// calls). Promotion to the heap has already happened.
    Varlist(Arc<Context>),
}

pub struct Frame<'e, 'f> {
    pub engine: &'e Engine,
    pub feed: &'f mut Feed,
    /// Output slot. Starts end-marked; end-marked after evaluation means
    /// the input produced no value.
    pub out: Cell,
    /// GC-safe scratch cell (holds the `eval` native's computed splice
    /// while it is in flight).
    pub cell: Cell,
    pub specifier: Specifier,
    pub flags: EvalFlags,
    /// Symbol this call was invoked through, if any.
    pub label: Option<Symbol>,
    pub(crate) dsp_orig: usize,
    pub(crate) chunk_orig: usize,
    /// Feed index where the current expression began (error reporting).
    pub(crate) expr_index: usize,
    /// The function actually dispatching (underlying of a
    /// specialization).
    pub(crate) phase: Option<Arc<FuncData>>,
    /// The function as invoked (the facade's owner).
    pub(crate) original: Option<Arc<FuncData>>,
    pub(crate) args: ArgHome,
    /// Per-call stamp definitional returns aim at.
    pub(crate) stamp: u64,
    /// Exit binding of the invoked function cell (the stamp a
    /// definitional return unwinds to when this call *is* the return).
    pub(crate) exit: Option<u64>,
    /// This call frame was dispatched as a lookback; its argument
    /// sub-evaluations defer normal-left enfix functions.
    pub(crate) lookback_call: bool,
    /// Out holds a punctuator's leavings and must not become a lookback
    /// left argument.
    pub(crate) out_stale: bool,
}

impl<'e, 'f> Frame<'e, 'f> {
    pub fn new(
        engine: &'e Engine,
        feed: &'f mut Feed,
        specifier: Specifier,
        flags: EvalFlags,
        label: Option<Symbol>,
    ) -> Frame<'e, 'f> {
        let depth = engine.depth.get();
        if depth >= engine.config.max_depth {
            fail(engine, "stack-overflow", "evaluator recursion limit reached");
        }
        engine.depth.set(depth + 1);
        engine.infos.borrow_mut().push(FrameInfo { label });
        trace!(depth = depth + 1, label = ?label, "frame push");
        let flags = if feed.is_va() {
            flags | EvalFlags::VA_LIST
        } else {
            flags
        };
        Frame {
            engine,
            feed,
            out: Cell::end(),
            cell: Cell::end(),
            specifier,
            flags,
            label,
            dsp_orig: engine.dsp(),
            chunk_orig: engine.chunk.borrow().len(),
            expr_index: 0,
            phase: None,
            original: None,
            args: ArgHome::None,
            stamp: 0,
            exit: None,
            lookback_call: false,
            out_stale: false,
        }
    }

    /// The function as invoked, for calls in progress.
    pub fn func(&self) -> Option<&Arc<FuncData>> {
        self.original.as_ref()
    }

    pub fn num_args(&self) -> usize {
        match &self.args {
            ArgHome::None => 0,
            ArgHome::Chunk { len, .. } => *len,
            ArgHome::Varlist(ctx) => ctx.len(),
        }
    }

    /// Read argument `index` (facade key order).
    pub fn arg(&self, index: usize) -> Cell {
        match &self.args {
            ArgHome::None => panic!("argument read outside a function call"),
            ArgHome::Chunk { base, len } => {
                assert!(index < *len, "argument index out of range");
                self.engine.chunk.borrow().get(base + index)
            }
            ArgHome::Varlist(ctx) => ctx
                .get(index)
                .unwrap_or_else(|| panic!("argument index out of range")),
        }
    }

    pub(crate) fn set_arg(&self, index: usize, cell: Cell) {
        match &self.args {
            ArgHome::None => panic!("argument write outside a function call"),
            ArgHome::Chunk { base, len } => {
                assert!(index < *len, "argument index out of range");
                self.engine.chunk.borrow_mut().set(base + index, cell);
            }
            ArgHome::Varlist(ctx) => match ctx.set(index, cell) {
                Ok(()) => {}
                Err(err) => fail_core(self.engine, err),
            },
        }
    }

    /// Read an argument by parameter name.
    pub fn arg_named(&self, name: &str) -> Option<Cell> {
        let func = self.original.as_ref()?;
        let index = func.keys.index_of(Symbol::intern(name))?;
        Some(self.arg(index))
    }

    /// The reified frame context, when the argument row lives in one.
    pub fn varlist(&self) -> Option<&Arc<Context>> {
        match &self.args {
            ArgHome::Varlist(ctx) => Some(ctx),
            _ => None,
        }
    }

    /// Raise a throw from this frame (native dispatchers pair this with
    /// `Dispatch::Thrown`).
    pub fn throw(&self, label: Cell, value: Cell) -> Thrown {
        throw_cells(self.engine, label, value)
    }

    /// Abort with an error value (never returns).
    pub fn fail(&self, id: &str, message: impl Into<String>) -> ! {
        fail(self.engine, id, message)
    }
}

impl Drop for Frame<'_, '_> {
    fn drop(&mut self) {
        self.engine.ds_truncate(self.dsp_orig);
        self.engine.chunk.borrow_mut().truncate(self.chunk_orig);
        self.engine.infos.borrow_mut().pop();
        self.engine.depth.set(self.engine.depth.get() - 1);
        trace!(depth = self.engine.depth.get(), "frame drop");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_core::Array;

    #[test]
    fn test_frame_rebalances_on_drop() {
        let engine = Engine::new();
        let mut feed = Feed::from_array(Array::new(), 0);
        {
            let frame = Frame::new(&engine, &mut feed, None, EvalFlags::empty(), None);
            frame.engine.ds_push(Cell::integer(1));
            frame.engine.chunk.borrow_mut().push_row(3);
            assert_eq!(engine.dsp(), 1);
        }
        assert_eq!(engine.dsp(), 0, "data stack rebalanced");
        assert_eq!(engine.chunk.borrow().len(), 0, "chunk stack rebalanced");
        assert_eq!(engine.depth.get(), 0);
    }

    #[test]
    fn test_depth_probe_fails() {
        let engine = Engine::with_config(crate::engine::EngineConfig::new().with_max_depth(1));
        let mut feed = Feed::from_array(Array::new(), 0);
        let _outer = Frame::new(&engine, &mut feed, None, EvalFlags::empty(), None);
        let mut feed2 = Feed::from_array(Array::new(), 0);
        let result = engine.trap(|engine| {
            let _inner = Frame::new(engine, &mut feed2, None, EvalFlags::empty(), None);
        });
        let error = result.unwrap_err();
        assert_eq!(
            crate::error::error_id(&error),
            Some(Symbol::intern("stack-overflow"))
        );
    }

    #[test]
    fn test_va_feed_sets_flag() {
        let engine = Engine::new();
        let mut feed = Feed::from_va(None, std::iter::empty());
        let frame = Frame::new(&engine, &mut feed, None, EvalFlags::empty(), None);
        assert!(frame.flags.contains(EvalFlags::VA_LIST));
    }
}
