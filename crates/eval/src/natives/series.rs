//! Series natives: the handful of block operations the core's own
//! tests and scenarios exercise. The full series library is a datatype
//! collaborator, not part of the evaluator core.

use super::{native, param};
use crate::error::fail_core;
use crate::frame::Frame;
use crate::invoke::Dispatch;
use vessel_core::{Cell, Kind, KindSet, kind::ANY_ARRAY};

pub(crate) fn extend(fields: &mut Vec<(&'static str, Cell)>) {
    fields.push((
        "append",
        native(
            "append",
            vec![param("series", ANY_ARRAY), param("value", KindSet::ANY_VALUE)],
            append_native,
        ),
    ));
    fields.push((
        "pick",
        native(
            "pick",
            vec![
                param("series", ANY_ARRAY),
                param("index", KindSet::of(&[Kind::Integer])),
            ],
            pick_native,
        ),
    ));
    fields.push((
        "length",
        native(
            "length",
            vec![param("series", ANY_ARRAY.with(Kind::Text))],
            length_native,
        ),
    ));
}

/// Append a value to a block; a block value splices its contents.
fn append_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let series = frame.arg(0);
    let value = frame.arg(1);
    let payload = series.series_payload().expect("series argument");
    let result = if value.try_kind() == Some(Kind::Block) {
        let source = value.series_payload().expect("block has a series");
        let cells: Vec<Cell> = (source.index..source.array.len())
            .filter_map(|i| source.array.get(i))
            .collect();
        payload.array.append_cells(cells)
    } else {
        payload.array.push(value)
    };
    if let Err(err) = result {
        fail_core(frame.engine, err);
    }
    frame.out = series;
    Dispatch::Out
}

fn pick_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let series = frame.arg(0);
    let index = frame.arg(1).as_integer().expect("index is an integer");
    let payload = series.series_payload().expect("series argument");
    frame.out = if index < 1 {
        Cell::blank()
    } else {
        payload
            .array
            .get(payload.index + (index as usize) - 1)
            .unwrap_or_else(Cell::blank)
    };
    Dispatch::Out
}

fn length_native(frame: &mut Frame<'_, '_>) -> Dispatch {
    let series = frame.arg(0);
    let length = if let Some(payload) = series.series_payload() {
        payload.array.len().saturating_sub(payload.index)
    } else if let Some(text) = series.as_text() {
        text.chars().count()
    } else {
        frame.fail("expect-arg", "length needs a series");
    };
    frame.out = Cell::integer(length as i64);
    Dispatch::Out
}
