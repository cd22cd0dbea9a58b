//! The central evaluator loop.
//!
//! One step: look at the prefetched cell, classify it, dispatch on the
//! class, write the result to the frame's output slot, then look one
//! cell ahead for a lookback (enfix) function before flushing any
//! pending set-word/set-path assignments. In `TO_END` mode the loop
//! repeats until the feed ends.
//!
//! Set-words and set-paths do not assign immediately: the target parks on
//! the data stack, the rest of the expression (lookbacks included)
//! computes, and the targets pop LIFO to receive the final value.

use crate::frame::{EvalFlags, Frame};
use crate::invoke::{InvokeDisposition, invoke};
use crate::path::{self, PathHit};
use crate::throw::Thrown;
use tracing::trace;
use vessel_core::{Binding, Cell, CellFlags, Kind, ParamClass, Specifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvalClass {
    Inert,
    Word,
    SetWord,
    GetWord,
    LitWord,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
    Bar,
    LitBar,
    Function,
}

fn eval_class(kind: Kind) -> EvalClass {
    match kind {
        Kind::Word => EvalClass::Word,
        Kind::SetWord => EvalClass::SetWord,
        Kind::GetWord => EvalClass::GetWord,
        Kind::LitWord => EvalClass::LitWord,
        Kind::Group => EvalClass::Group,
        Kind::Path => EvalClass::Path,
        Kind::SetPath => EvalClass::SetPath,
        Kind::GetPath => EvalClass::GetPath,
        Kind::LitPath => EvalClass::LitPath,
        Kind::Bar => EvalClass::Bar,
        Kind::LitBar => EvalClass::LitBar,
        Kind::Function => EvalClass::Function,
        _ => EvalClass::Inert,
    }
}

/// Drive the frame per its flags: one expression, or to the end of the
/// feed. The result lands in `frame.out`; end-marked means the input
/// produced no value.
pub(crate) fn do_core(f: &mut Frame<'_, '_>) -> Result<(), Thrown> {
    assert!(
        !f.engine.thrown_pending(),
        "evaluation began with a throw in flight"
    );
    f.out.set_end();
    loop {
        if f.feed.current().is_none() {
            break;
        }
        evaluate_expression(f)?;
        if f.flags.contains(EvalFlags::TO_END) {
            continue;
        }
        // Single-step mode: barriers yield no value; keep going until an
        // expression does or the input ends.
        if f.out.is_end() && f.feed.current().is_some() {
            continue;
        }
        break;
    }
    Ok(())
}

fn evaluate_expression(f: &mut Frame<'_, '_>) -> Result<(), Thrown> {
    let expr_dsp = f.engine.dsp();
    f.expr_index = f.feed.resume_index();
    f.out.set_end();
    f.out_stale = false;

    'fetch: loop {
        let Some(value) = f.feed.current().cloned() else {
            if f.engine.dsp() > expr_dsp {
                f.fail("need-value", "input ended before a set-word got a value");
            }
            return Ok(());
        };
        let kind = value
            .try_kind()
            .unwrap_or_else(|| panic!("end or trash cell fetched from a feed"));
        trace!(%value, "step");
        match eval_class(kind) {
            EvalClass::Bar => {
                if f.engine.dsp() > expr_dsp {
                    f.fail(
                        "need-value",
                        "expression barrier hit before a set-word got a value",
                    );
                }
                f.feed.advance();
                return Ok(());
            }
            EvalClass::LitBar => {
                f.feed.advance();
                f.out = Cell::bar();
            }
            EvalClass::Inert => {
                f.feed.advance();
                f.out = value
                    .derelativize(&f.specifier)
                    .with_flag(CellFlags::UNEVALUATED);
            }
            EvalClass::Word => {
                let gotten = match f.feed.gotten.take() {
                    Some(cached) => cached,
                    None => lookup_word(f, &value),
                };
                f.feed.advance();
                if gotten.as_function().is_some() {
                    let enfix = gotten.has_flag(CellFlags::ENFIXED);
                    let disposition = invoke(f, &gotten, value.word_symbol(), enfix, None)?;
                    if disposition == InvokeDisposition::Spliced {
                        continue 'fetch;
                    }
                } else if gotten.is_void() {
                    f.fail("no-value", format!("{value} has no value"));
                } else {
                    f.out = gotten;
                    f.out
                        .clear_flag(CellFlags::UNEVALUATED | CellFlags::ENFIXED);
                }
            }
            EvalClass::SetWord => {
                let target = value.derelativize(&f.specifier);
                if target.binding().is_none_or(Binding::is_unbound) {
                    f.fail("not-bound", format!("{value} is not bound to a context"));
                }
                f.feed.advance();
                f.engine.ds_push(target);
                continue 'fetch;
            }
            EvalClass::SetPath => {
                let target = value.derelativize(&f.specifier);
                f.feed.advance();
                f.engine.ds_push(target);
                continue 'fetch;
            }
            EvalClass::GetWord => {
                f.feed.advance();
                f.out = get_word_value(f, &value);
            }
            EvalClass::LitWord | EvalClass::LitPath => {
                f.feed.advance();
                f.out = value.unlit().derelativize(&f.specifier);
            }
            EvalClass::Group => {
                f.feed.advance();
                f.out = eval_group(f, &value)?;
            }
            EvalClass::Path => {
                f.feed.advance();
                match path::eval_path(f, &value)? {
                    PathHit::Value(picked) => {
                        if picked.is_void() {
                            f.fail("no-value", format!("{value} has no value"));
                        }
                        f.out = picked;
                    }
                    PathHit::Invoked => {}
                    PathHit::Spliced => continue 'fetch,
                }
            }
            EvalClass::GetPath => {
                f.feed.advance();
                f.out = path::get_path_value(f, &value)?;
            }
            EvalClass::Function => {
                f.feed.advance();
                let disposition = invoke(f, &value, None, false, None)?;
                if disposition == InvokeDisposition::Spliced {
                    continue 'fetch;
                }
            }
        }
        break 'fetch;
    }

    lookahead(f, expr_dsp)?;
    flush_assignments(f, expr_dsp)?;
    Ok(())
}

/// The one-cell peek: a word resolving to an enfixed function dispatches
/// with the output slot as its left argument. Suppressed on variadic
/// feeds and under `NO_LOOKAHEAD`. While gathering an argument for a
/// lookback call, only tight-left enfix functions bind; everything else
/// defers to the parent's lookahead, which is what gives `1 + 2 * 3`
/// its flat left-to-right precedence while still letting `if x = 3 [...]`
/// compare inside the condition.
fn lookahead(f: &mut Frame<'_, '_>, expr_dsp: usize) -> Result<(), Thrown> {
    if f.flags
        .intersects(EvalFlags::NO_LOOKAHEAD | EvalFlags::VA_LIST)
    {
        return Ok(());
    }
    loop {
        let Some(next) = f.feed.current().cloned() else {
            return Ok(());
        };
        if next.try_kind() != Some(Kind::Word) {
            return Ok(());
        }
        let Some(gotten) = try_lookup_word(f, &next) else {
            return Ok(());
        };
        let enfix = gotten.as_function().is_some() && gotten.has_flag(CellFlags::ENFIXED);
        if !enfix {
            // Cache the resolution for the next expression's head.
            f.feed.gotten = Some(gotten);
            return Ok(());
        }
        if f.flags.contains(EvalFlags::FULFILLING_ENFIX_ARG) {
            let func = &gotten.as_function().expect("checked above").func;
            let tight_left =
                matches!(func.first_param(), Some((_, key)) if key.class == ParamClass::Tight);
            if !tight_left {
                f.feed.gotten = Some(gotten);
                return Ok(());
            }
        }
        guard_set_targets(f, expr_dsp);
        f.feed.advance();
        let disposition = invoke(f, &gotten, next.word_symbol(), true, None)?;
        debug_assert_eq!(disposition, InvokeDisposition::Out);
    }
}

/// A set-path containing a group must not sit to the left of a lookback:
/// the group would have to evaluate twice, once for the capture and once
/// for the assignment.
fn guard_set_targets(f: &Frame<'_, '_>, expr_dsp: usize) {
    for idx in expr_dsp..f.engine.dsp() {
        let target = f.engine.ds_get(idx);
        if target.try_kind() != Some(Kind::SetPath) {
            continue;
        }
        let payload = target.series_payload().expect("set-path has a series");
        for i in payload.index..payload.array.len() {
            if payload.array.get(i).and_then(|c| c.try_kind()) == Some(Kind::Group) {
                f.fail(
                    "infix-path-group",
                    "a set-path with a group cannot be the left of a lookback",
                );
            }
        }
    }
}

/// Pop pending set-targets LIFO and assign the expression's value to
/// each.
fn flush_assignments(f: &mut Frame<'_, '_>, expr_dsp: usize) -> Result<(), Thrown> {
    if f.engine.dsp() == expr_dsp {
        return Ok(());
    }
    if f.out.is_end() || f.out.is_void() {
        f.fail("need-value", "no value to assign to a set-word or set-path");
    }
    let value = f.out.clone();
    while f.engine.dsp() > expr_dsp {
        let target = f.engine.ds_pop().expect("pending set-target");
        match target.try_kind() {
            Some(Kind::SetWord) => assign_word(f, &target, value.clone()),
            Some(Kind::SetPath) => path::assign_path(f, &target, value.clone())?,
            _ => panic!("non-target cell on the data stack during assignment"),
        }
    }
    Ok(())
}

/// Dereference a word for evaluation; unbound or missing is a failure.
pub(crate) fn lookup_word(f: &Frame<'_, '_>, word: &Cell) -> Cell {
    match try_lookup_word(f, word) {
        Some(value) => value,
        None => f.fail("not-bound", format!("{word} is not bound to a context")),
    }
}

pub(crate) fn try_lookup_word(f: &Frame<'_, '_>, word: &Cell) -> Option<Cell> {
    let payload = word.word_payload()?;
    let ctx = payload.binding.resolve(&f.specifier)?;
    ctx.select(payload.symbol)
}

/// Get-word semantics: void is a legal answer, unbound is not.
pub(crate) fn get_word_value(f: &Frame<'_, '_>, word: &Cell) -> Cell {
    match try_lookup_word(f, word) {
        Some(mut value) => {
            value.clear_flag(CellFlags::ENFIXED);
            value
        }
        None => f.fail("not-bound", format!("{word} is not bound to a context")),
    }
}

/// Assign a value through a specific set-word target.
pub(crate) fn assign_word(f: &mut Frame<'_, '_>, target: &Cell, value: Cell) {
    let payload = target.word_payload().expect("set-word target is a word");
    let Some(ctx) = payload.binding.resolve(&f.specifier) else {
        f.fail("not-bound", format!("{target} is not bound to a context"));
    };
    match ctx.update(payload.symbol, value) {
        Ok(true) => {}
        Ok(false) => f.fail("not-bound", format!("{target} is not present in its context")),
        Err(err) => crate::error::fail_core(f.engine, err),
    }
    // Bindings changed; the lookahead cache may be stale.
    f.feed.gotten = None;
}

/// Evaluate a group to a single value (void when empty).
pub(crate) fn eval_group(f: &mut Frame<'_, '_>, group: &Cell) -> Result<Cell, Thrown> {
    let payload = group.series_payload().expect("group has a series").clone();
    let specifier = derive_specifier(f, &payload.binding);
    let engine = f.engine;
    let mut feed = crate::feed::Feed::from_array(payload.array, payload.index);
    let out = {
        let mut child = Frame::new(engine, &mut feed, specifier, EvalFlags::TO_END, None);
        let result = do_core(&mut child);
        let out = child.out.clone();
        result.map(|()| out)
    }?;
    Ok(if out.is_end() { Cell::void() } else { out })
}

/// The specifier for the contents of a fetched array cell: a specific
/// binding supplies it directly; a relative (or unbound) one inherits
/// the frame's.
pub(crate) fn derive_specifier(f: &Frame<'_, '_>, binding: &Binding) -> Specifier {
    match binding {
        Binding::Specific(ctx) => Some(ctx.clone()),
        Binding::Relative(_) | Binding::Unbound => f.specifier.clone(),
    }
}
