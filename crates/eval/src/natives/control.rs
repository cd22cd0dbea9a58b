//! Flow-control natives: do/eval, branching, the throw protocol, loops,
//! quoting, and function generation.

use super::{do_branch, hard, native, native_flagged, param, refine, run_block};
use crate::error::fail_core;
use crate::frame::Frame;
use crate::host::{Outcome, Step};
use crate::invoke::Dispatch;
use crate::throw::catch_value;
use vessel_core::{Cell, CellFlags, FuncFlags, Kind, KindSet};

pub(crate) fn extend(fields: &mut Vec<(&'static str, Cell)>) {
    fields.push(("do", native("do", vec![param("value", KindSet::ANY_VALUE)], do_native)));
    fields.push((
        "eval",
        native_flagged(
            "eval",
            vec![param("value", KindSet::ANY)],
            eval_stub,
            FuncFlags::EVAL_SPLICE,
        ),
    ));
    fields.push((
        "if",
        native(
            "if",
            vec![
                param("condition", KindSet::ANY_VALUE),
                param("branch", KindSet::ANY_VALUE),
            ],
            if_native,
        ),
    ));
    fields.push((
        "either",
        native(
            "either",
            vec![
                param("condition", KindSet::ANY_VALUE),
                param("true-branch", KindSet::ANY_VALUE),
                param("false-branch", KindSet::ANY_VALUE),
            ],
            either_native,
        ),
    ));
    fields.push((
        "case",
        native(
            "case",
            vec![param("cases", KindSet::of(&[Kind::Block]))],
            case_native,
        ),
    ));
    fields.push((
        "catch",
        native(
            "catch",
            vec![
                param("block", KindSet::of(&[Kind::Block])),
                refine("name"),
                param("word", KindSet::of(&[Kind::Word])),
            ],
            catch_native,
        ),
    ));
    fields.push((
        "throw",
        native(
            "throw",
            vec![
                param("value", KindSet::ANY),
                refine("name"),
                param("word", KindSet::of(&[Kind::Word])),
            ],
            throw_native,
        ),
    ));
    fields.push((
        "loop",
        native(
            "loop",
            vec![
                param("count", KindSet::of(&[Kind::Integer])),
                param("body", KindSet::of(&[Kind::Block])),
            ],
            loop_native,
        ),
    ));
    fields.push(("break", native("break", vec![], break_native)));
    fields.push(("continue", native("continue", vec![], continue_native)));
    fields.push(("quit", native("quit", vec![], quit_native)));
    fields.push(("quote", native("quote", vec![hard("value")], quote_native)));
    fields.push((
        "unevaluated?",
        native("unevaluated?", vec![hard("value")], unevaluated_native),
    ));
    fields.push((
        "func",
        native(
            "func",
            vec![
                param("spec", KindSet::of(&[Kind::Block])),
                param("body", KindSet::of(&[Kind::Block])),
            ],
            func_native,
        ),
    ));
    fields.push((
        "set",
        native(
            "set",
            vec![
                param("word", KindSet::of(&[Kind::Word])),
                param("value", KindSet::ANY_VALUE),
            ],
            set_native,
        ),
    ));
    fields.push(("get", native("get", vec![param("word", KindSet::of(&[Kind::Word]))], get_native)));
}

fn do_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let value = frame.arg(0);
    match value.try_kind() {
        Some(Kind::Block) | Some(Kind::Group) => match run_block(frame, &value) {
            Outcome::Completed(out) => {
                frame.out = out;
                Dispatch::Out
            }
            Outcome::End => Dispatch::Void,
            Outcome::Thrown(_) => Dispatch::Thrown,
        },
        _ => {
            frame.out = value;
            frame.out.clear_flag(CellFlags::UNEVALUATED);
            Dispatch::Out
        }
    }
}

fn eval_stub(_frame: &mut Frame<'_, '_>) -> Dispatch {
    unreachable!("the evaluator intercepts eval and splices its argument")
}

fn if_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let condition = frame.arg(0);
    match condition.is_conditional_true() {
        Err(err) => fail_core(frame.engine, err),
        Ok(true) => {
            let branch = frame.arg(1);
            do_branch(frame, &branch)
        }
        Ok(false) => Dispatch::Void,
    }
}

fn either_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let condition = frame.arg(0);
    let branch = match condition.is_conditional_true() {
        Err(err) => fail_core(frame.engine, err),
        Ok(true) => frame.arg(1),
        Ok(false) => frame.arg(2),
    };
    do_branch(frame, &branch)
}

/// Linear scan: evaluate a condition expression, then either take the
/// next value as the branch or skip it literally.
fn case_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let cases = frame.arg(0);
    let payload = cases.series_payload().expect("cases is a block").clone();
    let specifier = super::block_specifier(&cases);
    let array = payload.array;
    let mut index = payload.index;
    loop {
        match frame.engine.do_next(&array, index, &specifier) {
            Step::End => return Dispatch::Void,
            Step::Thrown(_) => return Dispatch::Thrown,
            Step::Value { value: condition, index: next } => {
                index = next;
                let truthy = match condition.is_conditional_true() {
                    Ok(b) => b,
                    Err(err) => fail_core(frame.engine, err),
                };
                let Some(branch) = array.get(index) else {
                    frame.fail("arg-missing", "case condition without a branch");
                };
                index += 1;
                if truthy {
                    let branch = branch.derelativize(&specifier);
                    return do_branch(frame, &branch);
                }
            }
        }
    }
}

fn catch_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let block = frame.arg(0);
    let by_name = frame.arg(1).as_logic() == Some(true);
    let name = frame.arg(2);
    match run_block(frame, &block) {
        Outcome::Completed(out) => {
            frame.out = out;
            Dispatch::Out
        }
        Outcome::End => Dispatch::Void,
        Outcome::Thrown(label) => {
            let caught = if by_name {
                label == name
            } else {
                label.is_blank()
            };
            if caught {
                frame.out = catch_value(frame.engine);
                Dispatch::Out
            } else {
                Dispatch::Thrown
            }
        }
    }
}

fn throw_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let value = frame.arg(0);
    let label = if frame.arg(1).as_logic() == Some(true) {
        frame.arg(2)
    } else {
        Cell::blank()
    };
    let _ = frame.throw(label, value);
    Dispatch::Thrown
}

fn loop_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let count = frame.arg(0).as_integer().expect("count is an integer");
    let body = frame.arg(1);
    let mut last = Cell::void();
    for _ in 0..count {
        match run_block(frame, &body) {
            Outcome::Completed(out) => last = out,
            Outcome::End => last = Cell::void(),
            Outcome::Thrown(label) => {
                if label == Cell::word("break") {
                    let _ = catch_value(frame.engine);
                    return Dispatch::Void;
                }
                if label == Cell::word("continue") {
                    let _ = catch_value(frame.engine);
                    continue;
                }
                return Dispatch::Thrown;
            }
        }
    }
    frame.out = last;
    Dispatch::Out
}

fn break_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let _ = frame.throw(Cell::word("break"), Cell::void());
    Dispatch::Thrown
}

fn continue_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let _ = frame.throw(Cell::word("continue"), Cell::void());
    Dispatch::Thrown
}

fn quit_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let _ = frame.throw(Cell::word("quit"), Cell::void());
    Dispatch::Thrown
}

fn quote_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    frame.out = frame.arg(0);
    Dispatch::Out
}

fn unevaluated_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let sensed = frame.arg(0).has_flag(CellFlags::UNEVALUATED);
    frame.out = Cell::logic(sensed);
    Dispatch::Out
}

fn func_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let spec = frame.arg(0);
    let body = frame.arg(1);
    frame.out = crate::funcs::make_function(frame.engine, None, &spec, &body);
    Dispatch::Out
}

fn set_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let word = frame.arg(0);
    let value = frame.arg(1);
    let payload = word.word_payload().expect("word argument");
    let ctx = match &payload.binding {
        vessel_core::Binding::Specific(ctx) => ctx.clone(),
        _ => frame.fail("not-bound", format!("{word} is not bound to a context")),
    };
    match ctx.update(payload.symbol, value.clone()) {
        Ok(true) => {}
        Ok(false) => frame.fail("not-bound", format!("{word} is not present in its context")),
        Err(err) => fail_core(frame.engine, err),
    }
    frame.feed.gotten = None;
    frame.out = value;
    Dispatch::Out
}

fn get_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let word = frame.arg(0);
    let payload = word.word_payload().expect("word argument");
    let ctx = match &payload.binding {
        vessel_core::Binding::Specific(ctx) => ctx.clone(),
        _ => frame.fail("not-bound", format!("{word} is not bound to a context")),
    };
    match ctx.select(payload.symbol) {
        Some(mut value) => {
            value.clear_flag(CellFlags::ENFIXED);
            frame.out = value;
            Dispatch::Out
        }
        None => frame.fail("not-bound", format!("{word} is not present in its context")),
    }
}
