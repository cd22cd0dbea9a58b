//! The throw protocol: named catches, loop break/continue, and quit.

use std::sync::Arc;
use vessel_core::{Array, Cell, Context, Symbol};
use vessel_eval::{Engine, EvalFlags, Outcome, make_lib};

fn w(ctx: &Arc<Context>, name: &str) -> Cell {
    let mut cell = Cell::word(name);
    cell.bind_to(ctx);
    cell
}

fn blk(cells: Vec<Cell>) -> Cell {
    Cell::block(Array::from_cells(cells))
}

fn run(engine: &Engine, cells: Vec<Cell>) -> Outcome {
    engine.do_array_at(&Array::from_cells(cells), 0, &None, EvalFlags::empty())
}

fn path(cells: Vec<Cell>) -> Cell {
    Cell::path(Array::from_cells(cells))
}

#[test]
fn test_catch_name_matches_label() {
    let engine = Engine::new();
    let lib = make_lib();
    // catch/name [throw/name 7 'over] 'over => 7
    let throw_path = path(vec![w(&lib, "throw"), Cell::word("name")]);
    let catch_path = path(vec![w(&lib, "catch"), Cell::word("name")]);
    let out = run(
        &engine,
        vec![
            catch_path,
            blk(vec![throw_path, Cell::integer(7), Cell::lit_word("over")]),
            Cell::lit_word("over"),
        ],
    );
    assert_eq!(out, Outcome::Completed(Cell::integer(7)));
}

#[test]
fn test_catch_name_mismatch_rethrows() {
    let engine = Engine::new();
    let lib = make_lib();
    let throw_path = path(vec![w(&lib, "throw"), Cell::word("name")]);
    let catch_path = path(vec![w(&lib, "catch"), Cell::word("name")]);
    let out = run(
        &engine,
        vec![
            catch_path,
            blk(vec![throw_path, Cell::integer(7), Cell::lit_word("inner")]),
            Cell::lit_word("outer"),
        ],
    );
    let Outcome::Thrown(label) = out else {
        panic!("expected the throw to pass through");
    };
    assert_eq!(label, Cell::word("inner"));
    let _ = engine.take_thrown();
}

#[test]
fn test_plain_catch_ignores_named_throws() {
    let engine = Engine::new();
    let lib = make_lib();
    let throw_path = path(vec![w(&lib, "throw"), Cell::word("name")]);
    let out = run(
        &engine,
        vec![
            w(&lib, "catch"),
            blk(vec![throw_path, Cell::integer(7), Cell::lit_word("tag")]),
        ],
    );
    assert!(matches!(out, Outcome::Thrown(_)));
    let _ = engine.take_thrown();
}

#[test]
fn test_break_stops_the_loop() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("x", Cell::integer(0))]);
    let mut sw = Cell::set_word("x");
    sw.bind_to(&user);
    // loop 5 [x: x + 1 if x = 3 [break]] x => 3
    let body = blk(vec![
        sw,
        w(&user, "x"),
        w(&lib, "+"),
        Cell::integer(1),
        w(&lib, "if"),
        w(&user, "x"),
        w(&lib, "="),
        Cell::integer(3),
        blk(vec![w(&lib, "break")]),
    ]);
    let out = run(
        &engine,
        vec![
            w(&lib, "loop"),
            Cell::integer(5),
            body,
            w(&user, "x"),
        ],
    );
    assert_eq!(out, Outcome::Completed(Cell::integer(3)));
    assert!(!engine.thrown_pending());
}

#[test]
fn test_continue_skips_the_rest_of_the_body() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("x", Cell::integer(0))]);
    let mut sw = Cell::set_word("x");
    sw.bind_to(&user);
    // loop 5 [continue x: x + 1] x => 0
    let body = blk(vec![
        w(&lib, "continue"),
        sw,
        w(&user, "x"),
        w(&lib, "+"),
        Cell::integer(1),
    ]);
    let out = run(
        &engine,
        vec![
            w(&lib, "loop"),
            Cell::integer(5),
            body,
            w(&user, "x"),
        ],
    );
    assert_eq!(out, Outcome::Completed(Cell::integer(0)));
}

#[test]
fn test_quit_reaches_the_host() {
    let engine = Engine::new();
    let lib = make_lib();
    let out = run(&engine, vec![w(&lib, "quit"), Cell::integer(1)]);
    let Outcome::Thrown(label) = out else {
        panic!("expected quit to throw");
    };
    assert_eq!(label, Cell::word("quit"));
    let _ = engine.take_thrown();
}

#[test]
fn test_throw_crosses_function_calls() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [] [throw 5]
    let func = vessel_eval::make_function(
        &engine,
        Some(Symbol::intern("f")),
        &blk(vec![]),
        &blk(vec![w(&lib, "throw"), Cell::integer(5)]),
    );
    user.update(Symbol::intern("f"), func).unwrap();
    // catch [f] => 5: the throw unwinds through f's frame.
    let out = run(&engine, vec![w(&lib, "catch"), blk(vec![w(&user, "f")])]);
    assert_eq!(out, Outcome::Completed(Cell::integer(5)));
    assert_eq!(engine.dsp(), 0);
}
