//! Cross-cutting invariants: stack balance, throw-channel discipline,
//! lock release, do/do_next equivalence, and relative-cell containment.

use std::sync::Arc;
use vessel_core::{Array, ArrayFlags, Cell, Context, FuncId, Symbol};
use vessel_eval::{Engine, EvalFlags, Outcome, Step, make_lib};

fn w(ctx: &Arc<Context>, name: &str) -> Cell {
    let mut cell = Cell::word(name);
    cell.bind_to(ctx);
    cell
}

fn program(lib: &Arc<Context>) -> Arc<Array> {
    let user = Context::object(vec![("x", Cell::blank())]);
    let mut sw = Cell::set_word("x");
    sw.bind_to(&user);
    Array::from_cells(vec![
        sw,
        Cell::integer(10),
        w(&user, "x"),
        w(lib, "+"),
        Cell::integer(1),
        w(&user, "x"),
        w(lib, "*"),
        Cell::integer(2),
    ])
}

#[test]
fn test_do_and_do_next_loop_agree() {
    let engine = Engine::new();
    let lib = make_lib();
    let prog = program(&lib);

    let full = engine.do_array_at(&prog, 0, &None, EvalFlags::empty());

    let mut index = 0;
    let mut last = None;
    loop {
        match engine.do_next(&prog, index, &None) {
            Step::Value { value, index: next } => {
                last = Some(value);
                index = next;
            }
            Step::End => break,
            Step::Thrown(label) => panic!("unexpected throw: {label:?}"),
        }
    }
    assert_eq!(full, Outcome::Completed(last.expect("program yields values")));
}

#[test]
fn test_stacks_balance_after_normal_run() {
    let engine = Engine::new();
    let lib = make_lib();
    let prog = program(&lib);
    let _ = engine.do_array_at(&prog, 0, &None, EvalFlags::empty());
    assert_eq!(engine.dsp(), 0);
}

#[test]
fn test_stacks_balance_after_failure() {
    let engine = Engine::new();
    let lib = make_lib();
    // add 1 <end>: fails mid-fulfilment with a chunk row live.
    let prog = Array::from_cells(vec![w(&lib, "add"), Cell::integer(1)]);
    let result = engine.trap(|engine| engine.do_array_at(&prog, 0, &None, EvalFlags::empty()));
    assert!(result.is_err());
    assert_eq!(engine.dsp(), 0, "data stack rebalanced by the unwind");
    assert!(
        !prog.get_flag(ArrayFlags::RUNNING),
        "the walker's read-lock was released by the unwind"
    );
}

#[test]
fn test_running_flag_tracks_walking() {
    let engine = Engine::new();
    let lib = make_lib();
    let prog = program(&lib);
    assert!(!prog.get_flag(ArrayFlags::RUNNING));
    let _ = engine.do_array_at(&prog, 0, &None, EvalFlags::empty());
    assert!(!prog.get_flag(ArrayFlags::RUNNING), "clear when no frame walks it");
}

#[test]
fn test_throw_channel_carries_at_most_one() {
    let engine = Engine::new();
    let lib = make_lib();
    let prog = Array::from_cells(vec![w(&lib, "throw"), Cell::integer(9)]);
    let out = engine.do_array_at(&prog, 0, &None, EvalFlags::empty());
    let Outcome::Thrown(label) = out else {
        panic!("expected a throw");
    };
    assert!(label.has_flag(vessel_core::CellFlags::THROWN));
    assert!(engine.thrown_pending());
    let (taken_label, value) = engine.take_thrown().expect("one throw in flight");
    assert_eq!(taken_label, label);
    assert_eq!(value, Cell::integer(9));
    assert!(engine.take_thrown().is_none(), "the channel is now clear");
}

#[test]
fn test_engines_are_independent() {
    let one = Engine::new();
    let two = Engine::new();
    let lib = make_lib();
    let prog = Array::from_cells(vec![w(&lib, "throw"), Cell::integer(1)]);
    let _ = one.do_array_at(&prog, 0, &None, EvalFlags::empty());
    assert!(one.thrown_pending());
    assert!(!two.thrown_pending(), "engines share no thrown state");
    let _ = one.take_thrown();
}

#[test]
#[should_panic(expected = "relative binding resolved without a specifier")]
fn test_relative_cell_needs_matching_frame() {
    // A relative cell outside its function body is a corruption, not an
    // error value.
    let mut word = Cell::word("x");
    word.bind_relative(FuncId::fresh());
    let _ = word.derelativize(&None);
}

#[test]
fn test_error_where_names_the_call_chain() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("outer", Cell::blank())]);
    // outer: func [] [add 1] -- fails inside add's fulfilment
    let spec = Cell::block(Array::new());
    let body = Cell::block(Array::from_cells(vec![w(&lib, "add"), Cell::integer(1)]));
    let func = vessel_eval::make_function(&engine, Some(Symbol::intern("outer")), &spec, &body);
    user.update(Symbol::intern("outer"), func).unwrap();

    let prog = Array::from_cells(vec![w(&user, "outer")]);
    let error = engine
        .trap(|engine| engine.do_array_at(&prog, 0, &None, EvalFlags::empty()))
        .unwrap_err();
    let ctx = error.as_context().expect("error is a context");
    let where_block = ctx.select(Symbol::intern("where")).expect("where field");
    let labels = where_block.series_payload().expect("where is a block");
    let mut saw_outer = false;
    for i in labels.index..labels.array.len() {
        if labels.array.get(i) == Some(Cell::word("outer")) {
            saw_outer = true;
        }
    }
    assert!(saw_outer, "the failing call chain names `outer`");
}
