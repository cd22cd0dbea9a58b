//! The native library.
//!
//! The minimal set of natives the evaluator's own semantics need:
//! arithmetic (prefix and enfix), flow control, the throw protocol
//! words, function generation, and a few series operations. `make_lib`
//! assembles them into a library context that hosts bind their input
//! against.

pub mod control;
pub mod math;
pub mod series;

use crate::frame::Frame;
use crate::host::Outcome;
use crate::invoke::{Dispatch, Dispatcher};
use std::sync::Arc;
use vessel_core::{
    Cell, Context, FuncData, FuncFlags, KeyList, Kind, KindSet, ParamClass, Specifier, Typeset,
};

pub(crate) fn native(name: &str, keys: Vec<Typeset>, dispatcher: Dispatcher) -> Cell {
    native_flagged(name, keys, dispatcher, FuncFlags::empty())
}

pub(crate) fn native_flagged(
    name: &str,
    keys: Vec<Typeset>,
    dispatcher: Dispatcher,
    flags: FuncFlags,
) -> Cell {
    Cell::function(FuncData::native(
        name,
        KeyList::new(keys),
        dispatcher as usize,
        flags,
    ))
}

pub(crate) fn param(name: &str, kinds: KindSet) -> Typeset {
    Typeset::key(name, ParamClass::Normal, kinds)
}

pub(crate) fn tight(name: &str, kinds: KindSet) -> Typeset {
    Typeset::key(name, ParamClass::Tight, kinds)
}

pub(crate) fn hard(name: &str) -> Typeset {
    Typeset::key(name, ParamClass::HardQuote, KindSet::ANY_VALUE)
}

pub(crate) fn refine(name: &str) -> Typeset {
    Typeset::key(name, ParamClass::Refinement, KindSet::EMPTY)
}

/// The specifier carried by a block value's own binding.
pub(crate) fn block_specifier(block: &Cell) -> Specifier {
    match block.series_payload().map(|p| &p.binding) {
        Some(vessel_core::Binding::Specific(ctx)) => Some(ctx.clone()),
        _ => None,
    }
}

/// Run a block argument to its end.
pub(crate) fn run_block(frame: &Frame<'_, '_>, block: &Cell) -> Outcome {
    let payload = block.series_payload().expect("branch is a block");
    let specifier = block_specifier(block);
    frame.engine.do_array_at(
        &payload.array.clone(),
        payload.index,
        &specifier,
        crate::frame::EvalFlags::empty(),
    )
}

/// Branch semantics: blocks run, anything else is the result itself.
pub(crate) fn do_branch(frame: &mut Frame<'_, '_>, branch: &Cell) -> Dispatch {
    if matches!(branch.try_kind(), Some(Kind::Block) | Some(Kind::Group)) {
        match run_block(frame, branch) {
            Outcome::Completed(value) => {
                frame.out = value;
                Dispatch::Out
            }
            Outcome::End => Dispatch::Void,
            Outcome::Thrown(_) => Dispatch::Thrown,
        }
    } else {
        frame.out = branch.clone();
        frame.out.clear_flag(vessel_core::CellFlags::UNEVALUATED);
        Dispatch::Out
    }
}

/// Assemble the library context.
pub fn make_lib() -> Arc<Context> {
    let mut fields: Vec<(&str, Cell)> = Vec::new();
    math::extend(&mut fields);
    control::extend(&mut fields);
    series::extend(&mut fields);
    fields.push(("true", Cell::logic(true)));
    fields.push(("false", Cell::logic(false)));
    Context::object(fields)
}
