//! Host entry points.
//!
//! The four ways a host hands the evaluator work: a full run over an
//! array, a single step (returning the resume index), a variadic feed,
//! and direct function application (positionally with literal arguments,
//! or through a caller-built frame context). Throws surface as an
//! explicit outcome variant — a host that does not expect one escalates
//! with `expect_completed`, which turns it into the `no-catch` failure.

use crate::error::VesselError;
use crate::feed::Feed;
use crate::frame::{EvalFlags, Frame};
use crate::invoke::invoke_frame;
use crate::step::do_core;
use std::sync::Arc;
use vessel_core::{
    Array, Cell, Context, ContextSort, PointerClass, Specifier, classify_pointer,
};

use crate::engine::Engine;

/// Result of a full-run entry.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The input ran to its end; the last expression's value.
    Completed(Cell),
    /// The input was empty (or all barriers); no value.
    End,
    /// A throw escaped; the label is here, the argument stays stashed in
    /// the engine until taken.
    Thrown(Cell),
}

/// Result of a single-step entry.
#[derive(Debug, PartialEq)]
pub enum Step {
    /// One expression evaluated; resume at `index`.
    Value { value: Cell, index: usize },
    End,
    Thrown(Cell),
}

/// Result of a variadic-feed entry.
#[derive(Debug, PartialEq)]
pub enum VaOutcome {
    Completed(Cell),
    End,
    /// Single-step mode stopped with input left on the cursor (a
    /// variadic feed has no index to hand back).
    Partial(Cell),
    Thrown(Cell),
}

impl Engine {
    /// Evaluate `array` from `index` to its end.
    pub fn do_array_at(
        &self,
        array: &Arc<Array>,
        index: usize,
        specifier: &Specifier,
        flags: EvalFlags,
    ) -> Outcome {
        let mut feed = Feed::from_array(array.clone(), index);
        let mut frame = Frame::new(
            self,
            &mut feed,
            specifier.clone(),
            flags | EvalFlags::TO_END,
            None,
        );
        match do_core(&mut frame) {
            Err(_) => {
                let label = self.thrown_label().expect("throw marker without a stash");
                Outcome::Thrown(label)
            }
            Ok(()) => {
                if frame.out.is_end() {
                    Outcome::End
                } else {
                    Outcome::Completed(frame.out.clone())
                }
            }
        }
    }

    /// Evaluate one expression of `array` at `index`.
    pub fn do_next(&self, array: &Arc<Array>, index: usize, specifier: &Specifier) -> Step {
        let mut feed = Feed::from_array(array.clone(), index);
        let mut frame = Frame::new(self, &mut feed, specifier.clone(), EvalFlags::empty(), None);
        match do_core(&mut frame) {
            Err(_) => {
                let label = self.thrown_label().expect("throw marker without a stash");
                Step::Thrown(label)
            }
            Ok(()) => {
                if frame.out.is_end() {
                    Step::End
                } else {
                    let value = frame.out.clone();
                    let index = frame.feed.resume_index();
                    Step::Value { value, index }
                }
            }
        }
    }

    /// Evaluate a variadic feed. With `TO_END` this runs the cursor dry;
    /// without it, one expression evaluates and anything left reports as
    /// `Partial`.
    pub fn do_va(
        &self,
        first: Option<Cell>,
        rest: impl Iterator<Item = Cell> + 'static,
        flags: EvalFlags,
    ) -> VaOutcome {
        let mut feed = Feed::from_va(first, rest);
        let to_end = flags.contains(EvalFlags::TO_END);
        let mut frame = Frame::new(self, &mut feed, None, flags, None);
        match do_core(&mut frame) {
            Err(_) => {
                let label = self.thrown_label().expect("throw marker without a stash");
                VaOutcome::Thrown(label)
            }
            Ok(()) => {
                if frame.out.is_end() {
                    VaOutcome::End
                } else if !to_end && frame.feed.current().is_some() {
                    VaOutcome::Partial(frame.out.clone())
                } else {
                    VaOutcome::Completed(frame.out.clone())
                }
            }
        }
    }

    /// Variadic entry over raw pointers, classified by the pointer-kind
    /// oracle: cell pointers join the feed, the end signal stops it.
    /// UTF-8 text would need the scanner collaborator and fails here;
    /// freed nodes are corruption and panic.
    ///
    /// # Safety
    ///
    /// Every pointer must be non-null and point at a live `Cell`, a live
    /// node, the end signal, or valid UTF-8, and stay valid for the
    /// duration of the call.
    pub unsafe fn do_va_raw(&self, pointers: &[*const u8], flags: EvalFlags) -> VaOutcome {
        let mut cells = Vec::new();
        for &p in pointers {
            match unsafe { classify_pointer(p) } {
                PointerClass::End => break,
                PointerClass::Cell => {
                    let cell = unsafe { &*(p as *const Cell) };
                    cells.push(cell.clone());
                }
                PointerClass::Utf8Text => crate::error::fail(
                    self,
                    "need-scanner",
                    "UTF-8 text in a variadic feed needs the scanner collaborator",
                ),
                PointerClass::Series => crate::error::fail(
                    self,
                    "bad-va-item",
                    "a bare series node cannot ride a variadic feed",
                ),
                PointerClass::Freed => panic!("freed node in a variadic feed"),
            }
        }
        self.do_va(None, cells.into_iter(), flags)
    }

    /// Evaluate a single value as if it were the sole element of an
    /// input.
    pub fn eval_value(&self, value: &Cell, specifier: &Specifier) -> Outcome {
        let mut feed = Feed::from_va(
            Some(value.derelativize(specifier)),
            std::iter::empty(),
        );
        let mut frame = Frame::new(self, &mut feed, None, EvalFlags::TO_END, None);
        match do_core(&mut frame) {
            Err(_) => {
                let label = self.thrown_label().expect("throw marker without a stash");
                Outcome::Thrown(label)
            }
            Ok(()) => {
                if frame.out.is_end() {
                    Outcome::End
                } else {
                    Outcome::Completed(frame.out.clone())
                }
            }
        }
    }

    /// A fresh frame context for `func`, every slot void, ready to fill
    /// by name and run with `do_frame`.
    pub fn make_frame(&self, func: &Cell) -> Arc<Context> {
        let payload = func.as_function().expect("make_frame needs a function");
        let real = payload.func.real();
        Context::with_keys(
            ContextSort::Frame {
                func: real.id,
                stamp: self.fresh_stamp(),
            },
            payload.func.keys.clone(),
        )
    }

    /// Run a caller-built frame: slots are type-checked (never gathered)
    /// and the function dispatches.
    pub fn do_frame(&self, func: &Cell, ctx: &Arc<Context>) -> Outcome {
        let mut feed = Feed::empty();
        let mut frame = Frame::new(self, &mut feed, None, EvalFlags::empty(), None);
        match invoke_frame(&mut frame, func, ctx.clone()) {
            Err(_) => {
                let label = self.thrown_label().expect("throw marker without a stash");
                Outcome::Thrown(label)
            }
            Ok(()) => {
                if frame.out.is_end() {
                    Outcome::End
                } else {
                    Outcome::Completed(frame.out.clone())
                }
            }
        }
    }

    /// Apply a function to literal arguments, positionally. With `fully`
    /// set, leftover arguments are an error; otherwise they are ignored.
    pub fn apply_only(&self, applicand: &Cell, args: &[Cell], fully: bool) -> Outcome {
        let payload = applicand
            .as_function()
            .expect("apply_only needs a function");
        let ctx = self.make_frame(applicand);
        let keys = payload.func.keys.clone();
        let mut supplied = args.iter();
        for (i, key) in keys.iter().enumerate() {
            if !key.takes_argument() {
                continue;
            }
            match supplied.next() {
                Some(arg) => ctx.set(i, arg.clone()).expect("fresh frame is unlocked"),
                None => break,
            }
        }
        if fully && supplied.next().is_some() {
            crate::error::fail(
                self,
                "apply-too-many",
                "apply requested full consumption but arguments were left over",
            );
        }
        self.do_frame(applicand, &ctx)
    }

    /// Escalate a throw outcome into the `no-catch` failure; pass values
    /// and end through.
    pub fn expect_completed(&self, outcome: Outcome) -> Result<Cell, VesselError> {
        match outcome {
            Outcome::Completed(value) => Ok(value),
            Outcome::End => Ok(Cell::void()),
            Outcome::Thrown(label) => {
                let _ = self.take_thrown();
                Err(VesselError::NoCatch { label })
            }
        }
    }
}
