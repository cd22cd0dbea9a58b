//! Arithmetic and comparison natives.
//!
//! Each operation registers a prefix form (`add`) and an enfixed symbol
//! form (`+`). The symbol forms have normal parameters, which is what
//! gives chained operators flat left-to-right precedence; `tight*` is a
//! multiply whose parameters are tight on both sides, so it binds inside
//! a neighboring operator's argument instead of waiting its turn.

use super::{native, param, tight};
use crate::frame::Frame;
use crate::invoke::Dispatch;
use vessel_core::{Cell, CellFlags, KindSet, Typeset, kind::ANY_NUMBER};

pub(crate) fn extend(fields: &mut Vec<(&'static str, Cell)>) {
    fields.push(("add", native("add", two_numbers(), math_add)));
    fields.push(("subtract", native("subtract", two_numbers(), math_subtract)));
    fields.push(("multiply", native("multiply", two_numbers(), math_multiply)));
    fields.push(("divide", native("divide", two_numbers(), math_divide)));

    fields.push(("+", enfix(native("+", two_numbers(), math_add))));
    fields.push(("-", enfix(native("-", two_numbers(), math_subtract))));
    fields.push(("*", enfix(native("*", two_numbers(), math_multiply))));
    fields.push(("/", enfix(native("/", two_numbers(), math_divide))));
    fields.push((
        "tight*",
        enfix(native("tight*", two_tight_numbers(), math_multiply)),
    ));

    fields.push(("equal?", native("equal?", two_any(), cmp_equal)));
    fields.push(("lesser?", native("lesser?", two_numbers(), cmp_lesser)));
    fields.push(("greater?", native("greater?", two_numbers(), cmp_greater)));
    fields.push(("=", enfix(native("=", two_any(), cmp_equal))));
    fields.push(("<", enfix(native("<", two_numbers(), cmp_lesser))));
    fields.push((">", enfix(native(">", two_numbers(), cmp_greater))));
}

fn enfix(cell: Cell) -> Cell {
    cell.with_flag(CellFlags::ENFIXED)
}

fn two_numbers() -> Vec<Typeset> {
    vec![param("value1", ANY_NUMBER), param("value2", ANY_NUMBER)]
}

fn two_tight_numbers() -> Vec<Typeset> {
    vec![tight("value1", ANY_NUMBER), tight("value2", ANY_NUMBER)]
}

fn two_any() -> Vec<Typeset> {
    vec![
        param("value1", KindSet::ANY_VALUE),
        param("value2", KindSet::ANY_VALUE),
    ]
}

fn as_number(frame: &Frame<'_, '_>, cell: &Cell) -> f64 {
    if let Some(i) = cell.as_integer() {
        return i as f64;
    }
    match cell.as_decimal() {
        Some(d) => d,
        None => frame.fail("expect-arg", format!("{cell} is not a number")),
    }
}

fn arith(
    frame: &mut Frame<'_, '_>,
    int_op: fn(i64, i64) -> Option<i64>,
    dec_op: fn(f64, f64) -> f64,
) -> Dispatch {
    let a = frame.arg(0);
    let b = frame.arg(1);
    frame.out = match (a.as_integer(), b.as_integer()) {
        (Some(x), Some(y)) => match int_op(x, y) {
            Some(v) => Cell::integer(v),
            None => frame.fail("overflow", "integer arithmetic overflowed"),
        },
        _ => Cell::decimal(dec_op(as_number(frame, &a), as_number(frame, &b))),
    };
    Dispatch::Out
}

fn math_add(frame: &mut Frame<'_, '_>) -> Dispatch {
    arith(frame, i64::checked_add, |a, b| a + b)
}

fn math_subtract(frame: &mut Frame<'_, '_>) -> Dispatch {
    arith(frame, i64::checked_sub, |a, b| a - b)
}

fn math_multiply(frame: &mut Frame<'_, '_>) -> Dispatch {
    arith(frame, i64::checked_mul, |a, b| a * b)
}

fn math_divide(frame: &mut Frame<'_, '_>) -> Dispatch {
    let a = frame.arg(0);
    let b = frame.arg(1);
    if b.as_integer() == Some(0) || b.as_decimal() == Some(0.0) {
        frame.fail("zero-divide", "attempt to divide by zero");
    }
    frame.out = match (a.as_integer(), b.as_integer()) {
        (Some(x), Some(y)) => {
            if x % y == 0 {
                Cell::integer(x / y)
            } else {
                Cell::decimal(x as f64 / y as f64)
            }
        }
        _ => Cell::decimal(as_number(frame, &a) / as_number(frame, &b)),
    };
    Dispatch::Out
}

fn cmp_equal(frame: &mut Frame<'_, '_>) -> Dispatch {
    let equal = frame.arg(0) == frame.arg(1);
    frame.out = Cell::logic(equal);
    Dispatch::Out
}

fn cmp_lesser(frame: &mut Frame<'_, '_>) -> Dispatch {
    let (a, b) = (frame.arg(0), frame.arg(1));
    frame.out = Cell::logic(as_number(frame, &a) < as_number(frame, &b));
    Dispatch::Out
}

fn cmp_greater(frame: &mut Frame<'_, '_>) -> Dispatch {
    let (a, b) = (frame.arg(0), frame.arg(1));
    frame.out = Cell::logic(as_number(frame, &a) > as_number(frame, &b));
    Dispatch::Out
}
