//! Generated functions: calls, definitional return, locals,
//! refinements (in-order, out-of-order pickup, revocation), quoting,
//! and specialization.

use std::sync::Arc;
use vessel_core::{Array, Cell, CellFlags, Context, Symbol};
use vessel_eval::{Engine, EvalFlags, Outcome, make_function, make_lib, specialize};

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

/// Define `name: func spec body` into `user` and return the function.
fn define(
    engine: &Engine,
    user: &Arc<Context>,
    name: &str,
    spec: Vec<Cell>,
    body: Vec<Cell>,
) -> Cell {
    let func = make_function(
        engine,
        Some(Symbol::intern(name)),
        &blk(spec),
        &blk(body),
    );
    user.update(Symbol::intern(name), func.clone()).unwrap();
    func
}

#[test]
fn test_call_with_relative_parameter() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [x] [x + 1]
    define(
        &engine,
        &user,
        "f",
        vec![Cell::word("x")],
        vec![Cell::word("x"), w(&lib, "+"), Cell::integer(1)],
    );
    let out = run(&engine, vec![w(&user, "f"), Cell::integer(10)]);
    assert_eq!(out, Outcome::Completed(Cell::integer(11)));
}

#[test]
fn test_definitional_return_exits_early() {
    let engine = Engine::new();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [x] [return 2 3]
    define(
        &engine,
        &user,
        "f",
        vec![Cell::word("x")],
        vec![Cell::word("return"), Cell::integer(2), Cell::integer(3)],
    );
    let out = run(&engine, vec![w(&user, "f"), Cell::integer(1)]);
    assert_eq!(out, Outcome::Completed(Cell::integer(2)));
    assert!(!engine.thrown_pending(), "the return was caught by its call");
}

#[test]
fn test_return_unwinds_nested_calls() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [x] [if true [return x] 99]
    define(
        &engine,
        &user,
        "f",
        vec![Cell::word("x")],
        vec![
            w(&lib, "if"),
            w(&lib, "true"),
            blk(vec![Cell::word("return"), Cell::word("x")]),
            Cell::integer(99),
        ],
    );
    let out = run(&engine, vec![w(&user, "f"), Cell::integer(7)]);
    assert_eq!(out, Outcome::Completed(Cell::integer(7)));
}

#[test]
fn test_locals_start_void() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [x <local> tmp] [get 'tmp]
    define(
        &engine,
        &user,
        "f",
        vec![Cell::word("x"), Cell::tag("local"), Cell::word("tmp")],
        vec![w(&lib, "get"), Cell::lit_word("tmp")],
    );
    let out = run(&engine, vec![w(&user, "f"), Cell::integer(1)]);
    assert_eq!(out, Outcome::Completed(Cell::void()));
}

#[test]
fn test_refinement_in_order() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [a /double] [either double [a + a] [a]]
    define(
        &engine,
        &user,
        "f",
        vec![Cell::word("a"), Cell::refinement("double")],
        vec![
            w(&lib, "either"),
            Cell::word("double"),
            blk(vec![Cell::word("a"), w(&lib, "+"), Cell::word("a")]),
            blk(vec![Cell::word("a")]),
        ],
    );
    let plain = run(&engine, vec![w(&user, "f"), Cell::integer(3)]);
    assert_eq!(plain, Outcome::Completed(Cell::integer(3)));

    let path = Cell::path(Array::from_cells(vec![
        w(&user, "f"),
        Cell::word("double"),
    ]));
    let doubled = run(&engine, vec![path, Cell::integer(3)]);
    assert_eq!(doubled, Outcome::Completed(Cell::integer(6)));
}

#[test]
fn test_refinement_pickup_out_of_order() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [/b bv /a av] [av * 10 + bv]
    define(
        &engine,
        &user,
        "f",
        vec![
            Cell::refinement("b"),
            Cell::word("bv"),
            Cell::refinement("a"),
            Cell::word("av"),
        ],
        vec![
            Cell::word("av"),
            w(&lib, "*"),
            Cell::integer(10),
            w(&lib, "+"),
            Cell::word("bv"),
        ],
    );

    // f/b/a 1 2: arguments land in path order (bv=1, av=2).
    let in_order = Cell::path(Array::from_cells(vec![
        w(&user, "f"),
        Cell::word("b"),
        Cell::word("a"),
    ]));
    let out = run(&engine, vec![in_order, Cell::integer(1), Cell::integer(2)]);
    assert_eq!(out, Outcome::Completed(Cell::integer(21)));

    // f/a/b 1 2: the spec order differs from the path order, so /b's
    // argument waits for pickup (av=1, bv=2).
    let out_of_order = Cell::path(Array::from_cells(vec![
        w(&user, "f"),
        Cell::word("a"),
        Cell::word("b"),
    ]));
    let out = run(
        &engine,
        vec![out_of_order, Cell::integer(1), Cell::integer(2)],
    );
    assert_eq!(out, Outcome::Completed(Cell::integer(12)));
    assert_eq!(engine.dsp(), 0, "pickup requests were consumed");
}

#[test]
fn test_refinement_revoked_by_void() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func [a /opt o] [either opt [o] [a]]
    define(
        &engine,
        &user,
        "f",
        vec![
            Cell::word("a"),
            Cell::refinement("opt"),
            Cell::word("o"),
        ],
        vec![
            w(&lib, "either"),
            Cell::word("opt"),
            blk(vec![Cell::word("o")]),
            blk(vec![Cell::word("a")]),
        ],
    );
    // f/opt 5 (do []): the void argument revokes /opt.
    let path = Cell::path(Array::from_cells(vec![w(&user, "f"), Cell::word("opt")]));
    let void_group = Cell::group(Array::from_cells(vec![
        w(&lib, "do"),
        Cell::block(Array::new()),
    ]));
    let out = run(&engine, vec![path, Cell::integer(5), void_group]);
    assert_eq!(out, Outcome::Completed(Cell::integer(5)));
}

#[test]
fn test_hard_quote_preserves_unevaluated() {
    let engine = Engine::new();
    let lib = make_lib();
    // quote x => the word itself, marked unevaluated
    let out = run(&engine, vec![w(&lib, "quote"), Cell::word("x")]);
    let Outcome::Completed(cell) = out else {
        panic!("expected completion");
    };
    assert_eq!(cell, Cell::word("x"));
    assert!(cell.has_flag(CellFlags::UNEVALUATED));

    // unevaluated? senses the flag on literal arguments
    let out = run(&engine, vec![w(&lib, "unevaluated?"), Cell::integer(3)]);
    assert_eq!(out, Outcome::Completed(Cell::logic(true)));
}

#[test]
fn test_soft_quote_evaluates_groups_only() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("f", Cell::blank())]);
    // f: func ['v] [v]
    define(
        &engine,
        &user,
        "f",
        vec![Cell::lit_word("v")],
        vec![Cell::word("v")],
    );
    // f some-word => the word itself, unevaluated
    let out = run(&engine, vec![w(&user, "f"), Cell::word("some-word")]);
    assert_eq!(out, Outcome::Completed(Cell::word("some-word")));

    // f (1 + 2) => 3, because groups escape the quote
    let group = Cell::group(Array::from_cells(vec![
        Cell::integer(1),
        w(&lib, "+"),
        Cell::integer(2),
    ]));
    let out = run(&engine, vec![w(&user, "f"), group]);
    assert_eq!(out, Outcome::Completed(Cell::integer(3)));
}

#[test]
fn test_specialize_prefills_and_activates() {
    let engine = Engine::new();
    let lib = make_lib();
    let append = lib.select(Symbol::intern("append")).unwrap();
    // ap-c: specialize :append [value: [c]]
    let ap_c = specialize(
        &engine,
        &append,
        Some(Symbol::intern("ap-c")),
        &[("value", blk(vec![Cell::word("c")]))],
    );
    let user = Context::object(vec![("ap-c", ap_c)]);
    let series = blk(vec![Cell::word("a"), Cell::word("b")]);
    let out = run(&engine, vec![w(&user, "ap-c"), series]);
    let expected = blk(vec![Cell::word("a"), Cell::word("b"), Cell::word("c")]);
    assert_eq!(out, Outcome::Completed(expected));
}

#[test]
fn test_punctuator_blocks_lookback_left() {
    use vessel_core::{FuncData, FuncFlags, KeyList};
    use vessel_eval::{Dispatch, Dispatcher, Frame};

    fn stop(_frame: &mut Frame<'_, '_>) -> Dispatch {
        Dispatch::Void
    }
    let punct = Cell::function(FuncData::native(
        "||",
        KeyList::empty(),
        (stop as Dispatcher) as usize,
        FuncFlags::empty(),
    ))
    .with_flag(CellFlags::ENFIXED);
    let user = Context::object(vec![("||", punct)]);
    let lib = make_lib();
    let engine = Engine::new();

    // 1 || => void: the arity-0 lookback runs and the 1 is discarded.
    let out = run(&engine, vec![Cell::integer(1), w(&user, "||")]);
    assert_eq!(out, Outcome::Completed(Cell::void()));

    // 1 || + 2 => error: a punctuator's leavings cannot become the left
    // argument of the next lookback.
    let error = engine
        .trap(|engine| {
            engine.do_array_at(
                &Array::from_cells(vec![
                    Cell::integer(1),
                    w(&user, "||"),
                    w(&lib, "+"),
                    Cell::integer(2),
                ]),
                0,
                &None,
                EvalFlags::empty(),
            )
        })
        .unwrap_err();
    assert_eq!(
        vessel_eval::error_id(&error),
        Some(Symbol::intern("no-left-argument"))
    );
}

#[test]
fn test_function_argument_row_is_reclaimed() {
    let engine = Engine::new();
    let user = Context::object(vec![("f", Cell::blank())]);
    define(
        &engine,
        &user,
        "f",
        vec![Cell::word("x")],
        vec![Cell::word("x")],
    );
    let out = run(&engine, vec![w(&user, "f"), Cell::integer(4)]);
    assert_eq!(out, Outcome::Completed(Cell::integer(4)));
    assert_eq!(engine.dsp(), 0);
}
