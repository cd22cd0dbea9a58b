//! Boundary behavior: ends, barriers, missing arguments, unknown
//! refinements, and lock faults.

use std::sync::Arc;
use vessel_core::{Array, ArrayFlags, Cell, Context, Symbol};
use vessel_eval::{Engine, EvalFlags, Outcome, VesselError, error_id, make_lib};

fn w(ctx: &Arc<Context>, name: &str) -> Cell {
    let mut cell = Cell::word(name);
    cell.bind_to(ctx);
    cell
}

fn run(engine: &Engine, cells: Vec<Cell>) -> Outcome {
    engine.do_array_at(&Array::from_cells(cells), 0, &None, EvalFlags::empty())
}

fn run_err(engine: &Engine, cells: Vec<Cell>) -> Symbol {
    let error = engine
        .trap(|engine| run(engine, cells.clone()))
        .unwrap_err();
    error_id(&error).expect("error has an id")
}

#[test]
fn test_empty_input_ends_with_no_value() {
    let engine = Engine::new();
    assert_eq!(run(&engine, vec![]), Outcome::End);
}

#[test]
fn test_input_ending_mid_call_is_arg_missing() {
    let engine = Engine::new();
    let lib = make_lib();
    let id = run_err(&engine, vec![w(&lib, "add"), Cell::integer(1)]);
    assert_eq!(id, Symbol::intern("arg-missing"));
}

#[test]
fn test_barrier_mid_call_is_arg_missing() {
    let engine = Engine::new();
    let lib = make_lib();
    let id = run_err(
        &engine,
        vec![w(&lib, "add"), Cell::integer(1), Cell::bar(), Cell::integer(2)],
    );
    assert_eq!(id, Symbol::intern("arg-missing"));
}

#[test]
fn test_lookback_at_start_has_no_left_argument() {
    let engine = Engine::new();
    let lib = make_lib();
    let id = run_err(&engine, vec![w(&lib, "+"), Cell::integer(1), Cell::integer(2)]);
    assert_eq!(id, Symbol::intern("no-left-argument"));
}

#[test]
fn test_unknown_refinement_is_rejected() {
    let engine = Engine::new();
    let lib = make_lib();
    // append/bogus [a] [b]
    let path = Cell::path(Array::from_cells(vec![
        w(&lib, "append"),
        Cell::word("bogus"),
    ]));
    let series = Cell::block(Array::from_cells(vec![Cell::word("a")]));
    let value = Cell::block(Array::from_cells(vec![Cell::word("b")]));
    let id = run_err(&engine, vec![path, series, value]);
    assert_eq!(id, Symbol::intern("bad-refine"));
}

#[test]
fn test_set_path_with_group_rejected_as_lookback_left() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("o", Cell::context(Context::object(vec![(
        "g",
        Cell::integer(0),
    )])))]);
    // o/(g): 1 + 2 -- the group in the set-path is the hazard
    let group = Cell::group(Array::from_cells(vec![Cell::word("g")]));
    let mut set_path = Cell::set_path(Array::from_cells(vec![Cell::word("o"), group]));
    set_path.bind_to(&user);
    let id = run_err(
        &engine,
        vec![
            set_path,
            Cell::integer(1),
            w(&lib, "+"),
            Cell::integer(2),
        ],
    );
    assert_eq!(id, Symbol::intern("infix-path-group"));
}

#[test]
fn test_path_reads_and_set_path_assigns() {
    let engine = Engine::new();
    let inner = Context::object(vec![("g", Cell::integer(0))]);
    let user = Context::object(vec![("o", Cell::context(inner.clone()))]);

    // o/g: 42
    let set_path = Cell::set_path(Array::from_cells(vec![w(&user, "o"), Cell::word("g")]));
    let out = run(&engine, vec![set_path, Cell::integer(42)]);
    assert_eq!(out, Outcome::Completed(Cell::integer(42)));
    assert_eq!(inner.select(Symbol::intern("g")), Some(Cell::integer(42)));

    // o/g => 42
    let path = Cell::path(Array::from_cells(vec![w(&user, "o"), Cell::word("g")]));
    assert_eq!(
        run(&engine, vec![path]),
        Outcome::Completed(Cell::integer(42))
    );

    // :o/g fetches without invoking
    let get_path = Cell::get_path(Array::from_cells(vec![w(&user, "o"), Cell::word("g")]));
    assert_eq!(
        run(&engine, vec![get_path]),
        Outcome::Completed(Cell::integer(42))
    );
}

#[test]
fn test_plain_set_word_left_of_lookback_is_fine() {
    let engine = Engine::new();
    let lib = make_lib();
    let user = Context::object(vec![("x", Cell::blank())]);
    let mut set_word = Cell::set_word("x");
    set_word.bind_to(&user);
    let out = run(
        &engine,
        vec![set_word, Cell::integer(1), w(&lib, "+"), Cell::integer(2)],
    );
    assert_eq!(out, Outcome::Completed(Cell::integer(3)));
    assert_eq!(user.select(Symbol::intern("x")), Some(Cell::integer(3)));
}

#[test]
fn test_unbound_word_faults() {
    let engine = Engine::new();
    let id = run_err(&engine, vec![Cell::word("nowhere")]);
    assert_eq!(id, Symbol::intern("not-bound"));
}

#[test]
fn test_word_with_no_value_faults() {
    let engine = Engine::new();
    let user = Context::object(vec![("ghost", Cell::blank())]);
    user.set(0, Cell::void()).unwrap();
    let id = run_err(&engine, vec![w(&user, "ghost")]);
    assert_eq!(id, Symbol::intern("no-value"));
}

#[test]
fn test_mutating_a_running_array_faults() {
    // The input block appends to itself while the evaluator walks it.
    let engine = Engine::new();
    let lib = make_lib();
    let program = Array::from_cells(vec![]);
    let user = Context::object(vec![("self-block", Cell::block(program.clone()))]);
    program
        .append_cells(vec![
            w(&lib, "append"),
            w(&user, "self-block"),
            Cell::integer(1),
        ])
        .unwrap();
    let error = engine
        .trap(|engine| engine.do_array_at(&program, 0, &None, EvalFlags::empty()))
        .unwrap_err();
    assert_eq!(error_id(&error), Some(Symbol::intern("locked-series")));
    // The unwind released the walker's read-lock.
    assert!(!program.get_flag(ArrayFlags::RUNNING));
}

#[test]
fn test_uncaught_throw_escalates_to_no_catch() {
    let engine = Engine::new();
    let lib = make_lib();
    let out = run(&engine, vec![w(&lib, "throw"), Cell::integer(5)]);
    let Outcome::Thrown(label) = out else {
        panic!("expected a thrown outcome");
    };
    assert!(label.is_blank());
    let err = engine.expect_completed(Outcome::Thrown(label)).unwrap_err();
    assert!(matches!(err, VesselError::NoCatch { .. }));
    assert!(!engine.thrown_pending());
}

#[test]
fn test_void_condition_faults() {
    let engine = Engine::new();
    let lib = make_lib();
    // case [(do []) [1]] -- the condition evaluates to void
    let group = Cell::group(Array::from_cells(vec![w(&lib, "do"), Cell::block(Array::new())]));
    let cases = Cell::block(Array::from_cells(vec![group, Cell::block(Array::from_cells(vec![
        Cell::integer(1),
    ]))]));
    let id = run_err(&engine, vec![w(&lib, "case"), cases]);
    assert_eq!(id, Symbol::intern("need-value"));
}

#[test]
fn test_stack_overflow_probe() {
    use vessel_eval::EngineConfig;
    let engine = Engine::with_config(EngineConfig::new().with_max_depth(16));
    // f: func [] [f] f  -- unbounded recursion
    let user = Context::object(vec![("f", Cell::blank())]);
    let spec = Cell::block(Array::new());
    let body = Cell::block(Array::from_cells(vec![w(&user, "f")]));
    let func = vessel_eval::make_function(&engine, None, &spec, &body);
    user.update(Symbol::intern("f"), func).unwrap();
    let id = run_err(&engine, vec![w(&user, "f")]);
    assert_eq!(id, Symbol::intern("stack-overflow"));
    assert_eq!(engine.dsp(), 0, "unwind rebalanced the data stack");
}
