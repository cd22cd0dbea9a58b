//! Path evaluation.
//!
//! A path walks from its head value through pickers: words select out of
//! contexts, integers index into blocks, groups evaluate to produce the
//! picker. When the walk lands on a function, the remaining segments
//! become refinement requests — parked on the data stack in path order —
//! and the function is invoked; this is how out-of-order refinement
//! pickup begins.

use crate::frame::Frame;
use crate::invoke::{InvokeDisposition, invoke};
use crate::step::{derive_specifier, eval_group, lookup_word};
use crate::throw::Thrown;
use vessel_core::{Binding, Cell, Kind, Specifier, Symbol};

pub(crate) enum PathHit {
    /// The walk produced a plain value.
    Value(Cell),
    /// The walk hit a function; it was invoked and wrote the frame's out.
    Invoked,
    /// The walk hit the `eval` native, which spliced instead.
    Spliced,
}

/// Evaluate a path in value position: functions found along the way are
/// invoked, with trailing segments as refinements.
pub(crate) fn eval_path(f: &mut Frame<'_, '_>, path: &Cell) -> Result<PathHit, Thrown> {
    walk(f, path, true)
}

/// Get-path semantics: no invocation; a function is returned literally.
pub(crate) fn get_path_value(f: &mut Frame<'_, '_>, path: &Cell) -> Result<Cell, Thrown> {
    match walk(f, path, false)? {
        PathHit::Value(value) => Ok(value),
        PathHit::Invoked | PathHit::Spliced => unreachable!("get-path never invokes"),
    }
}

fn walk(f: &mut Frame<'_, '_>, path: &Cell, invoke_allowed: bool) -> Result<PathHit, Thrown> {
    let payload = path.series_payload().expect("path has a series").clone();
    let path_spec = derive_specifier(f, &payload.binding);
    let array = payload.array.clone();
    let len = array.len();
    if payload.index >= len {
        f.fail("bad-path", "empty path");
    }

    let head = array
        .get(payload.index)
        .expect("path head in range")
        .derelativize(&path_spec);
    let label = head.word_symbol();
    let mut current = match head.try_kind() {
        Some(Kind::Word) => lookup_in(f, &head, &path_spec),
        Some(Kind::Group) => eval_group(f, &head)?,
        Some(_) => head.clone(),
        None => panic!("end or trash cell in a path"),
    };

    let mut seg = payload.index + 1;
    while seg < len {
        if current.as_function().is_some() {
            if !invoke_allowed {
                f.fail("bad-path", "refinements need an invocation, not a get-path");
            }
            return invoke_with_refinements(f, &current, label, &array, seg, len, &path_spec);
        }
        let segment = array
            .get(seg)
            .expect("path segment in range")
            .derelativize(&path_spec);
        let picker = if segment.try_kind() == Some(Kind::Group) {
            eval_group(f, &segment)?
        } else {
            segment
        };
        current = pick(f, &current, &picker)?;
        seg += 1;
    }

    if invoke_allowed && current.as_function().is_some() {
        let disposition = invoke(f, &current, label, false, None)?;
        return Ok(match disposition {
            InvokeDisposition::Out => PathHit::Invoked,
            InvokeDisposition::Spliced => PathHit::Spliced,
        });
    }
    Ok(PathHit::Value(current))
}

fn invoke_with_refinements(
    f: &mut Frame<'_, '_>,
    func_cell: &Cell,
    label: Option<Symbol>,
    array: &std::sync::Arc<vessel_core::Array>,
    first_seg: usize,
    len: usize,
    path_spec: &Specifier,
) -> Result<PathHit, Thrown> {
    let refine_base = f.engine.dsp();
    for seg in first_seg..len {
        let segment = array
            .get(seg)
            .expect("path segment in range")
            .derelativize(path_spec);
        let request = if segment.try_kind() == Some(Kind::Group) {
            eval_group(f, &segment)?
        } else {
            segment
        };
        let Some(sym) = request.word_symbol() else {
            f.fail(
                "bad-refine",
                format!("{request} cannot name a refinement"),
            );
        };
        f.engine.ds_push(Cell::refinement(sym));
    }
    let disposition = invoke(f, func_cell, label, false, Some(refine_base))?;
    Ok(match disposition {
        InvokeDisposition::Out => PathHit::Invoked,
        InvokeDisposition::Spliced => PathHit::Spliced,
    })
}

/// Assign through a set-path: walk to the owner of the last segment,
/// then write it.
pub(crate) fn assign_path(
    f: &mut Frame<'_, '_>,
    target: &Cell,
    value: Cell,
) -> Result<(), Thrown> {
    let payload = target.series_payload().expect("set-path has a series").clone();
    let path_spec = derive_specifier(f, &payload.binding);
    let array = payload.array.clone();
    let len = array.len();
    if len.saturating_sub(payload.index) < 2 {
        f.fail("bad-path", "a set-path needs a head and a final segment");
    }

    let head = array
        .get(payload.index)
        .expect("path head in range")
        .derelativize(&path_spec);
    let mut owner = match head.try_kind() {
        Some(Kind::Word) => lookup_in(f, &head, &path_spec),
        Some(Kind::Group) => eval_group(f, &head)?,
        Some(_) => head.clone(),
        None => panic!("end or trash cell in a path"),
    };

    // Walk to the next-to-last segment.
    for seg in payload.index + 1..len - 1 {
        let segment = array
            .get(seg)
            .expect("path segment in range")
            .derelativize(&path_spec);
        let picker = if segment.try_kind() == Some(Kind::Group) {
            eval_group(f, &segment)?
        } else {
            segment
        };
        owner = pick(f, &owner, &picker)?;
    }

    let last = array
        .get(len - 1)
        .expect("final segment in range")
        .derelativize(&path_spec);
    let picker = if last.try_kind() == Some(Kind::Group) {
        eval_group(f, &last)?
    } else {
        last
    };

    if let Some(ctx) = owner.as_context() {
        let Some(sym) = picker.word_symbol() else {
            f.fail("bad-path-set", format!("{picker} cannot name a field"));
        };
        match ctx.update(sym, value) {
            Ok(true) => {}
            Ok(false) => f.fail("bad-path-set", format!("no {picker} field to assign")),
            Err(err) => crate::error::fail_core(f.engine, err),
        }
        f.feed.gotten = None;
        return Ok(());
    }
    if let Some(series) = owner.series_payload() {
        let Some(n) = picker.as_integer() else {
            f.fail("bad-path-set", "blocks assign through integer pickers");
        };
        if n < 1 {
            f.fail("bad-path-set", format!("index {n} out of range"));
        }
        let index = series.index + (n as usize) - 1;
        match series.array.set(index, value) {
            Ok(()) => {}
            Err(err) => crate::error::fail_core(f.engine, err),
        }
        f.feed.gotten = None;
        return Ok(());
    }
    f.fail(
        "bad-path-set",
        format!("cannot assign into a {}", owner.kind().name()),
    )
}

/// One pick step of a path walk.
fn pick(f: &Frame<'_, '_>, current: &Cell, picker: &Cell) -> Result<Cell, Thrown> {
    if let Some(ctx) = current.as_context() {
        let Some(sym) = picker.word_symbol() else {
            f.fail("bad-path-pick", format!("{picker} cannot pick from a context"));
        };
        return match ctx.select(sym) {
            Some(value) => Ok(value),
            None => f.fail("bad-path-pick", format!("no {picker} field in context")),
        };
    }
    if let Some(series) = current.series_payload() {
        if let Some(n) = picker.as_integer() {
            if n < 1 {
                return Ok(Cell::blank());
            }
            let index = series.index + (n as usize) - 1;
            return Ok(series.array.get(index).unwrap_or_else(Cell::blank));
        }
        if picker.word_symbol().is_some() {
            // select semantics: the value following the matching word
            let len = series.array.len();
            for i in series.index..len {
                if series.array.get(i).as_ref() == Some(picker) {
                    return Ok(series.array.get(i + 1).unwrap_or_else(Cell::blank));
                }
            }
            return Ok(Cell::blank());
        }
        f.fail("bad-path-pick", format!("{picker} cannot pick from a block"));
    }
    f.fail(
        "bad-path-pick",
        format!("cannot pick from a {}", current.kind().name()),
    )
}

/// Head-of-path lookup: the head word dereferences through its own
/// binding (or the path's specifier for relative heads).
fn lookup_in(f: &Frame<'_, '_>, head: &Cell, _path_spec: &Specifier) -> Cell {
    let payload = head.word_payload().expect("head is a word");
    if matches!(payload.binding, Binding::Unbound) {
        f.fail("not-bound", format!("{head} is not bound to a context"));
    }
    lookup_word(f, head)
}
