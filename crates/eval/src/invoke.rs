//! Function invocation: argument fulfilment and dispatch.
//!
//! `invoke` drives one call: resolve the underlying function through any
//! specialization chain, allocate the argument row (a chunk-stack row for
//! natives, a reified frame varlist for interpreted or durable
//! functions), walk parameters and arguments in lockstep honoring the
//! parameter classes and any exemplar pre-fills, type-check, dispatch,
//! and drop the row. Refinements requested out of definition order are
//! parked on the data stack and picked up after the in-order walk.
//!
//! Lookback (enfix) calls arrive here with the would-be left argument
//! taken from the caller's output slot; a lookback with no parameters at
//! all is a punctuator and leaves the output stale.

use crate::feed::Feed;
use crate::frame::{ArgHome, EvalFlags, Frame};
use crate::funcs::make_return_cell;
use crate::step::{do_core, eval_group, get_word_value};
use crate::throw::{Thrown, catch_value};
use std::sync::Arc;
use tracing::{debug, trace};
use vessel_core::{
    Cell, CellFlags, Context, ContextSort, FuncBody, FuncData, FuncFlags, Kind, ParamClass,
    Typeset,
};

/// What a native dispatcher reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// `out` holds the result.
    Out,
    /// The result is void; `out` need not have been written.
    Void,
    /// The result is logic true; `out` need not have been written.
    True,
    /// A throw was raised (the engine's thrown slot is set).
    Thrown,
    /// Re-enter the dispatcher.
    Redo,
}

/// Signature of a native function body.
pub type Dispatcher = fn(&mut Frame<'_, '_>) -> Dispatch;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InvokeDisposition {
    /// The call completed; `out` holds the result.
    Out,
    /// The `eval` native spliced its argument into the feed; no value
    /// was produced and the expression restarts.
    Spliced,
}

enum LeftArg {
    NotLookback,
    /// Lookback position with nothing usable on the left.
    Missing,
    Value(Cell),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Arguments before any refinement.
    Required,
    /// Under an in-use refinement; a leading void revokes it.
    Active,
    /// Under an unused refinement: no consumption, slots are void.
    Skipped,
    /// Refinement revoked; further arguments still consume but must be
    /// void.
    Revoked,
    /// Under an out-of-order refinement; slots fill at pickup time.
    Deferred,
}

/// Invoke a function with arguments from `f`'s feed. `refine_base`
/// marks where a path invocation parked its refinement requests on the
/// data stack.
pub(crate) fn invoke(
    f: &mut Frame<'_, '_>,
    func_cell: &Cell,
    label: Option<vessel_core::Symbol>,
    lookback: bool,
    refine_base: Option<usize>,
) -> Result<InvokeDisposition, Thrown> {
    let payload = func_cell
        .as_function()
        .expect("invoke on a non-function cell")
        .clone();
    let original = payload.func.clone();
    let real = original.real();

    if original.flags.contains(FuncFlags::EVAL_SPLICE) {
        return invoke_eval_splice(f, &original);
    }

    let left = if lookback {
        if f.out_stale || f.out.is_end() {
            LeftArg::Missing
        } else {
            LeftArg::Value(f.out.clone())
        }
    } else {
        LeftArg::NotLookback
    };
    let punctuator = lookback && original.first_param().is_none();

    let stamp = f.engine.fresh_stamp();
    let keys = original.keys.clone();
    let needs_varlist =
        matches!(real.body, FuncBody::Interpreted { .. }) || original.is_durable();
    let home = if needs_varlist {
        ArgHome::Varlist(Context::with_keys(
            ContextSort::Frame {
                func: real.id,
                stamp,
            },
            keys.clone(),
        ))
    } else {
        let base = f.engine.chunk.borrow_mut().push_row(keys.len());
        ArgHome::Chunk {
            base,
            len: keys.len(),
        }
    };

    let exemplar = original.exemplar.clone();
    let inherited = f.flags & EvalFlags::NO_ARGS_EVALUATE;
    let specifier = f.specifier.clone();
    let engine = f.engine;
    debug!(func = ?original, lookback, "invoke");

    let result = {
        let mut call = Frame::new(engine, &mut *f.feed, specifier, inherited, label);
        if let Some(base) = refine_base {
            call.dsp_orig = base;
        }
        call.original = Some(original.clone());
        call.phase = Some(real.clone());
        call.args = home;
        call.stamp = stamp;
        call.exit = payload.exit;
        call.lookback_call = lookback;
        fulfill_args(&mut call, left, refine_base, exemplar.as_ref())
            .and_then(|()| dispatch_call(&mut call))
            .map(|()| {
                if call.out.is_end() {
                    Cell::void()
                } else {
                    call.out.clone()
                }
            })
    };

    f.feed.gotten = None;
    match result {
        Ok(out) => {
            f.out = out;
            f.out_stale = punctuator;
            Ok(InvokeDisposition::Out)
        }
        Err(thrown) => {
            // A definitional return aimed at this very call is caught
            // here; anything else keeps unwinding.
            let label_cell = f
                .engine
                .thrown_label()
                .expect("throw marker without a stashed throw");
            if let Some(fp) = label_cell.as_function() {
                if fp.exit == Some(stamp) {
                    f.out = catch_value(f.engine);
                    f.out_stale = false;
                    return Ok(InvokeDisposition::Out);
                }
            }
            Err(thrown)
        }
    }
}

/// Run a caller-built frame context: type-check only, then dispatch.
pub(crate) fn invoke_frame(
    f: &mut Frame<'_, '_>,
    func_cell: &Cell,
    ctx: Arc<Context>,
) -> Result<(), Thrown> {
    let payload = func_cell
        .as_function()
        .expect("invoke_frame on a non-function cell")
        .clone();
    let original = payload.func.clone();
    let real = original.real();
    let engine = f.engine;
    let label = original.name;
    let stamp = ctx.frame_stamp().unwrap_or(0);

    let result = {
        let mut call = Frame::new(
            engine,
            &mut *f.feed,
            None,
            EvalFlags::EXECUTE_FRAME,
            label,
        );
        call.original = Some(original.clone());
        call.phase = Some(real.clone());
        call.args = ArgHome::Varlist(ctx);
        call.stamp = stamp;
        call.exit = payload.exit;
        check_frame_args(&mut call)
            .and_then(|()| dispatch_call(&mut call))
            .map(|()| {
                if call.out.is_end() {
                    Cell::void()
                } else {
                    call.out.clone()
                }
            })
    };

    match result {
        Ok(out) => {
            f.out = out;
            Ok(())
        }
        Err(thrown) => {
            let label_cell = f
                .engine
                .thrown_label()
                .expect("throw marker without a stashed throw");
            if let Some(fp) = label_cell.as_function() {
                if fp.exit == Some(stamp) && stamp != 0 {
                    f.out = catch_value(f.engine);
                    return Ok(());
                }
            }
            Err(thrown)
        }
    }
}

/// The `eval` native: gather one argument, then splice it back into the
/// feed as the next thing to evaluate.
fn invoke_eval_splice(
    f: &mut Frame<'_, '_>,
    original: &Arc<FuncData>,
) -> Result<InvokeDisposition, Thrown> {
    let key = original
        .keys
        .get(0)
        .cloned()
        .expect("eval takes one argument");
    let arg = match fulfill_from_callsite(f, &key)? {
        Got::Value(cell) => cell,
        Got::End => f.fail("arg-missing", "eval needs a value to evaluate"),
    };
    // The scratch cell is the splice's GC-safe home while in flight.
    f.cell = arg.clone();
    f.feed.splice(arg);
    Ok(InvokeDisposition::Spliced)
}

fn fulfill_args(
    call: &mut Frame<'_, '_>,
    left: LeftArg,
    refine_base: Option<usize>,
    exemplar: Option<&Arc<Context>>,
) -> Result<(), Thrown> {
    let original = call.original.clone().expect("call frame has a function");
    let keys = original.keys.clone();

    // Lookback: the left argument fills the first argument-taking slot
    // before the walk.
    let mut left_filled: Option<usize> = None;
    match left {
        LeftArg::NotLookback => {}
        LeftArg::Missing => {
            if let Some((idx, key)) = original.first_param() {
                if key.is_endable() {
                    call.set_arg(idx, Cell::void());
                    left_filled = Some(idx);
                } else {
                    call.fail(
                        "no-left-argument",
                        format!("{} has no left argument to take", describe(&original)),
                    );
                }
            }
        }
        LeftArg::Value(value) => {
            if let Some((idx, key)) = original.first_param() {
                let key = key.clone();
                typecheck(call, &original, &key, &value)?;
                call.set_arg(idx, value);
                left_filled = Some(idx);
            }
        }
    }

    let mut mode = Mode::Required;
    let mut refine_slot: Option<usize> = None;
    let mut args_since_refine = 0usize;
    let mut pickups: Vec<usize> = Vec::new();

    for i in 0..keys.len() {
        let key = keys.get(i).cloned().expect("key index in range");
        if left_filled == Some(i) {
            args_since_refine += 1;
            continue;
        }
        match key.class {
            ParamClass::Local => call.set_arg(i, Cell::void()),
            ParamClass::Return => call.set_arg(i, make_return_cell(call.stamp)),
            ParamClass::Refinement => {
                mode = process_refinement(call, i, &key, refine_base, exemplar, &mut pickups);
                refine_slot = Some(i);
                args_since_refine = 0;
            }
            _ => fulfill_one(
                call,
                &original,
                i,
                &key,
                &mut mode,
                refine_slot,
                &mut args_since_refine,
                exemplar,
            )?,
        }
    }

    // A request that matched no refinement key is an unknown refinement.
    if let Some(base) = refine_base {
        if call.engine.dsp() > base {
            let leftover = call.engine.ds_get(base);
            call.fail(
                "bad-refine",
                format!("{} has no {} refinement", describe(&original), leftover),
            );
        }
    }

    // Out-of-order pickups consume their arguments from the input now,
    // in the order the path requested them.
    for key_idx in pickups {
        let mut pmode = Mode::Active;
        let mut since = 0usize;
        let mut j = key_idx + 1;
        while j < keys.len() {
            let key = keys.get(j).cloned().expect("key index in range");
            if !key.takes_argument() {
                break;
            }
            fulfill_one(
                call,
                &original,
                j,
                &key,
                &mut pmode,
                Some(key_idx),
                &mut since,
                exemplar,
            )?;
            j += 1;
        }
    }
    Ok(())
}

/// Decide a refinement slot's state from the parked requests and the
/// exemplar, and record out-of-order pickups.
fn process_refinement(
    call: &mut Frame<'_, '_>,
    slot: usize,
    key: &Typeset,
    refine_base: Option<usize>,
    exemplar: Option<&Arc<Context>>,
    pickups: &mut Vec<usize>,
) -> Mode {
    let sym = key.key.expect("refinement key has a symbol");
    if let Some(base) = refine_base {
        let dsp = call.engine.dsp();
        let found = (base..dsp).find(|&idx| call.engine.ds_get(idx).word_symbol() == Some(sym));
        if let Some(idx) = found {
            call.engine.ds_remove(idx);
            call.set_arg(slot, Cell::logic(true));
            return if idx == base {
                trace!(refinement = %sym, "refinement in order");
                Mode::Active
            } else {
                trace!(refinement = %sym, "refinement parked for pickup");
                pickups.push(slot);
                Mode::Deferred
            };
        }
    }
    if let Some(ex) = exemplar {
        let slot_fill = ex.get(slot).unwrap_or_else(Cell::void);
        if !slot_fill.is_void() {
            let active = !slot_fill.is_blank() && slot_fill.as_logic() != Some(false);
            call.set_arg(slot, if active { Cell::logic(true) } else { Cell::blank() });
            return if active { Mode::Active } else { Mode::Skipped };
        }
    }
    call.set_arg(slot, Cell::blank());
    Mode::Skipped
}

#[allow(clippy::too_many_arguments)]
fn fulfill_one(
    call: &mut Frame<'_, '_>,
    func: &Arc<FuncData>,
    i: usize,
    key: &Typeset,
    mode: &mut Mode,
    refine_slot: Option<usize>,
    args_since_refine: &mut usize,
    exemplar: Option<&Arc<Context>>,
) -> Result<(), Thrown> {
    match *mode {
        Mode::Skipped => {
            if let Some(ex) = exemplar {
                if ex.get(i).is_some_and(|c| !c.is_void()) {
                    call.fail(
                        "bad-refine",
                        "argument specialized under an unused refinement",
                    );
                }
            }
            call.set_arg(i, Cell::void());
            return Ok(());
        }
        Mode::Deferred => {
            // Filled later, at pickup.
            call.set_arg(i, Cell::void());
            return Ok(());
        }
        _ => {}
    }

    // Exemplar pre-fills short-circuit the call site.
    if let Some(ex) = exemplar {
        let fill = ex.get(i).unwrap_or_else(Cell::void);
        if !fill.is_void() {
            typecheck(call, func, key, &fill)?;
            call.set_arg(i, fill);
            *args_since_refine += 1;
            return Ok(());
        }
    }

    match fulfill_from_callsite(call, key)? {
        Got::End => {
            // Endable parameter at end of input arrives as void.
            call.set_arg(i, Cell::void());
            *args_since_refine += 1;
            Ok(())
        }
        Got::Value(arg) => {
            if arg.is_void() {
                match *mode {
                    Mode::Active => {
                        if *args_since_refine == 0 {
                            let slot = refine_slot.expect("active mode has a refinement slot");
                            call.set_arg(slot, Cell::logic(false));
                            *mode = Mode::Revoked;
                        } else {
                            call.fail(
                                "bad-refine-revoke",
                                "refinement arguments were only partially void",
                            );
                        }
                    }
                    Mode::Revoked => {}
                    _ => {}
                }
            } else if *mode == Mode::Revoked {
                call.fail("bad-refine-revoke", "revoked refinement received a value");
            }
            let skip_check = arg.is_void() && matches!(*mode, Mode::Revoked);
            if !skip_check {
                typecheck(call, func, key, &arg)?;
            }
            call.set_arg(i, arg);
            *args_since_refine += 1;
            Ok(())
        }
    }
}

enum Got {
    Value(Cell),
    /// Input ended (or hit a barrier) and the parameter tolerates it.
    End,
}

fn fulfill_from_callsite(call: &mut Frame<'_, '_>, key: &Typeset) -> Result<Got, Thrown> {
    if key.is_variadic() {
        // Eager rendition: the rest of the feed reifies into a block.
        let array = call.feed.reify();
        call.flags -= EvalFlags::VA_LIST;
        let index = call.feed.resume_index();
        while call.feed.current().is_some() {
            call.feed.advance();
        }
        return Ok(Got::Value(Cell::block_at(array, index)));
    }

    let current = call.feed.current().cloned();
    let ended = match &current {
        None => true,
        Some(cell) => cell.is_bar(),
    };
    if ended {
        if key.is_endable() {
            return Ok(Got::End);
        }
        let name = key.key.map(|s| s.as_str()).unwrap_or("argument");
        call.fail("arg-missing", format!("input ended before {name} was fulfilled"));
    }
    let source = current.expect("checked non-end above");

    if call.flags.contains(EvalFlags::NO_ARGS_EVALUATE) {
        call.feed.advance();
        return Ok(Got::Value(source.derelativize(&call.specifier)));
    }

    match key.class {
        ParamClass::HardQuote => {
            call.feed.advance();
            Ok(Got::Value(
                source
                    .derelativize(&call.specifier)
                    .with_flag(CellFlags::UNEVALUATED),
            ))
        }
        ParamClass::SoftQuote => {
            let evaluates = matches!(
                source.try_kind(),
                Some(Kind::Group) | Some(Kind::GetWord) | Some(Kind::GetPath)
            );
            call.feed.advance();
            if evaluates {
                let value = eval_soft(call, &source)?;
                Ok(Got::Value(value))
            } else {
                Ok(Got::Value(
                    source
                        .derelativize(&call.specifier)
                        .with_flag(CellFlags::UNEVALUATED),
                ))
            }
        }
        ParamClass::Normal => eval_subexpression(call, EvalFlags::empty()),
        ParamClass::Tight => eval_subexpression(call, EvalFlags::NO_LOOKAHEAD),
        _ => unreachable!("non-argument class reached the call site"),
    }
}

/// Evaluate one sub-expression of the shared feed into a fresh child
/// frame, for a normal or tight argument.
fn eval_subexpression(call: &mut Frame<'_, '_>, extra: EvalFlags) -> Result<Got, Thrown> {
    let engine = call.engine;
    let specifier = call.specifier.clone();
    let mut flags = extra;
    if call.lookback_call {
        flags |= EvalFlags::FULFILLING_ENFIX_ARG;
    }
    let out = {
        let mut child = Frame::new(engine, &mut *call.feed, specifier, flags, None);
        let result = do_core(&mut child);
        let out = child.out.clone();
        drop(child);
        result?;
        out
    };
    if out.is_end() {
        Ok(Got::End)
    } else {
        Ok(Got::Value(out))
    }
}

/// Soft-quote escape: groups, get-words, and get-paths evaluate.
fn eval_soft(call: &mut Frame<'_, '_>, source: &Cell) -> Result<Cell, Thrown> {
    match source.try_kind() {
        Some(Kind::Group) => eval_group(call, source),
        Some(Kind::GetWord) => Ok(get_word_value(call, source)),
        Some(Kind::GetPath) => crate::path::get_path_value(call, source),
        _ => unreachable!("eval_soft on a literal"),
    }
}

fn typecheck(
    call: &Frame<'_, '_>,
    func: &Arc<FuncData>,
    key: &Typeset,
    value: &Cell,
) -> Result<(), Thrown> {
    let Some(kind) = value.try_kind() else {
        panic!("typecheck on a non-value cell");
    };
    if !key.accepts(kind) {
        let name = key.key.map(|s| s.as_str()).unwrap_or("argument");
        call.fail(
            "expect-arg",
            format!(
                "{} does not allow {} for its {} argument",
                describe(func),
                kind.name(),
                name
            ),
        );
    }
    Ok(())
}

/// Type-check a caller-built argument row (`EXECUTE_FRAME`).
fn check_frame_args(call: &mut Frame<'_, '_>) -> Result<(), Thrown> {
    let original = call.original.clone().expect("call frame has a function");
    let keys = original.keys.clone();
    let mut in_skipped = false;
    for i in 0..keys.len() {
        let key = keys.get(i).cloned().expect("key index in range");
        match key.class {
            ParamClass::Local => call.set_arg(i, Cell::void()),
            ParamClass::Return => call.set_arg(i, make_return_cell(call.stamp)),
            ParamClass::Refinement => {
                let slot = call.arg(i);
                let active = match slot.try_kind() {
                    None | Some(Kind::Void) | Some(Kind::Blank) => false,
                    Some(Kind::Logic) => slot.as_logic() == Some(true),
                    _ => call.fail(
                        "bad-refine",
                        "refinement slot must be logic, blank, or void",
                    ),
                };
                call.set_arg(i, if active { Cell::logic(true) } else { Cell::blank() });
                in_skipped = !active;
            }
            _ => {
                let arg = call.arg(i);
                if in_skipped {
                    if !arg.is_void() {
                        call.fail("bad-refine", "argument filled under an unused refinement");
                    }
                } else if arg.is_void() {
                    if !key.is_endable() && !key.kinds.contains(Kind::Void) {
                        let name = key.key.map(|s| s.as_str()).unwrap_or("argument");
                        call.fail("arg-missing", format!("frame slot {name} was not filled"));
                    }
                } else {
                    typecheck(call, &original, &key, &arg)?;
                }
            }
        }
    }
    Ok(())
}

/// Dispatch the call: run the native dispatcher (under the varlist
/// write-hold) or the interpreted body.
fn dispatch_call(call: &mut Frame<'_, '_>) -> Result<(), Thrown> {
    loop {
        let phase = call.phase.clone().expect("call frame has a phase");
        match &phase.body {
            FuncBody::Native { dispatcher } => {
                let dispatch: Dispatcher = unsafe { std::mem::transmute(*dispatcher) };
                let hold = call.varlist().map(|ctx| ctx.hold());
                if hold.is_some() {
                    call.flags |= EvalFlags::NATIVE_HOLD;
                }
                let verdict = dispatch(call);
                call.flags -= EvalFlags::NATIVE_HOLD;
                drop(hold);
                match verdict {
                    Dispatch::Out => return Ok(()),
                    Dispatch::Void => {
                        call.out = Cell::void();
                        return Ok(());
                    }
                    Dispatch::True => {
                        call.out = Cell::logic(true);
                        return Ok(());
                    }
                    Dispatch::Thrown => {
                        debug_assert!(
                            call.engine.thrown_pending(),
                            "dispatcher reported a throw without raising one"
                        );
                        return Err(Thrown);
                    }
                    Dispatch::Redo => continue,
                }
            }
            FuncBody::Interpreted { body } => {
                let ctx = call
                    .varlist()
                    .cloned()
                    .expect("interpreted call has a varlist");
                let body = body.clone();
                let label = call.label;
                let engine = call.engine;
                let mut feed = Feed::from_array(body, 0);
                let result = {
                    let mut child =
                        Frame::new(engine, &mut feed, Some(ctx), EvalFlags::TO_END, label);
                    let result = do_core(&mut child);
                    call.out = child.out.clone();
                    result
                };
                return result;
            }
            FuncBody::Specialized => {
                unreachable!("phase resolves through the specialization chain")
            }
        }
    }
}

fn describe(func: &Arc<FuncData>) -> String {
    match func.name {
        Some(name) => name.as_str().to_string(),
        None => "an anonymous function".to_string(),
    }
}
