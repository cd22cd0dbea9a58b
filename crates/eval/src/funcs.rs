//! Function generation and specialization.
//!
//! The spec dialect maps source cues to parameter classes: a word is a
//! normal argument, a get-word hard-quotes, a lit-word soft-quotes, a
//! refinement opens a refinement group, a set-word (or anything after a
//! `<local>` tag) is a local, and a `<tight>` tag marks the next
//! parameter tight. A block after a parameter narrows its typeset. Every
//! generated function gets a definitionally scoped `return`.
//!
//! Bodies are deep-copied with words that match a parameter rebound
//! relative to the new function's identity; the copies are resolved
//! against a concrete frame at each call.

use crate::engine::Engine;
use crate::error::fail;
use crate::frame::Frame;
use crate::invoke::{Dispatch, Dispatcher};
use std::sync::Arc;
use vessel_core::{
    Array, Cell, Context, ContextSort, FuncData, FuncFlags, FuncId, KeyList, Kind, KindSet,
    ParamClass, ParamFlags, Symbol, Typeset,
};

thread_local! {
    /// The shared definitional-return native. Each call's return cell
    /// pairs this function with the call's exit stamp.
    static RETURN_FUNC: Arc<FuncData> = build_return_func();
}

fn build_return_func() -> Arc<FuncData> {
    let keys = KeyList::new(vec![
        Typeset::key("value", ParamClass::Normal, KindSet::ANY).with_flags(ParamFlags::ENDABLE),
    ]);
    FuncData::native(
        "return",
        keys,
        (return_dispatcher as Dispatcher) as usize,
        FuncFlags::DEFINITIONAL_RETURN,
    )
}

/// The cell pre-filled into a `return`-class slot at call time.
pub(crate) fn make_return_cell(stamp: u64) -> Cell {
    RETURN_FUNC.with(|func| Cell::function_with_exit(func.clone(), stamp))
}

fn return_dispatcher(frame: &mut Frame<'_, '_>) -> Dispatch {
    let value = frame.arg(0);
    let stamp = frame
        .exit
        .expect("definitional return invoked without an exit binding");
    let label = RETURN_FUNC.with(|func| Cell::function_with_exit(func.clone(), stamp));
    let _ = frame.throw(label, value);
    Dispatch::Thrown
}

/// Analyze a spec block into parameter keys (without the implicit
/// `return` key).
pub fn analyze_spec(engine: &Engine, spec: &Cell) -> Vec<Typeset> {
    let Some(payload) = spec.series_payload() else {
        fail(engine, "bad-func-def", "function spec must be a block");
    };
    let array = payload.array.clone();
    let mut keys: Vec<Typeset> = Vec::new();
    let mut tight_next = false;
    let mut locals_mode = false;

    for i in payload.index..array.len() {
        let cell = array.get(i).expect("spec cell in range");
        match cell.try_kind() {
            Some(Kind::Text) => {} // description
            Some(Kind::Tag) => match cell.as_text() {
                Some("local") => locals_mode = true,
                Some("tight") => tight_next = true,
                _ => {}
            },
            Some(Kind::Word) => {
                let sym = cell.word_symbol().expect("word has a symbol");
                let class = if locals_mode {
                    ParamClass::Local
                } else if std::mem::take(&mut tight_next) {
                    ParamClass::Tight
                } else {
                    ParamClass::Normal
                };
                keys.push(Typeset::key(sym, class, KindSet::ANY_VALUE));
            }
            Some(Kind::GetWord) => {
                let sym = cell.word_symbol().expect("word has a symbol");
                keys.push(Typeset::key(sym, ParamClass::HardQuote, KindSet::ANY_VALUE));
            }
            Some(Kind::LitWord) => {
                let sym = cell.word_symbol().expect("word has a symbol");
                keys.push(Typeset::key(sym, ParamClass::SoftQuote, KindSet::ANY_VALUE));
            }
            Some(Kind::Refinement) => {
                let sym = cell.word_symbol().expect("word has a symbol");
                if locals_mode {
                    fail(engine, "bad-func-def", "refinement after <local>");
                }
                keys.push(Typeset::key(sym, ParamClass::Refinement, KindSet::EMPTY));
            }
            Some(Kind::SetWord) => {
                let sym = cell.word_symbol().expect("word has a symbol");
                keys.push(Typeset::key(sym, ParamClass::Local, KindSet::ANY));
            }
            Some(Kind::Block) => {
                let Some(last) = keys.last_mut() else {
                    fail(engine, "bad-func-def", "type block before any parameter");
                };
                last.kinds = type_block(engine, &cell);
            }
            _ => fail(
                engine,
                "bad-func-def",
                format!("{cell} is not a spec dialect item"),
            ),
        }
    }
    keys
}

fn type_block(engine: &Engine, block: &Cell) -> KindSet {
    let payload = block.series_payload().expect("type block has a series");
    let mut kinds = KindSet::EMPTY;
    for i in payload.index..payload.array.len() {
        let cell = payload.array.get(i).expect("type cell in range");
        let named = cell
            .word_symbol()
            .and_then(|sym| Kind::from_name(sym.canon_str()));
        match named {
            Some(kind) => kinds = kinds.with(kind),
            None => fail(engine, "bad-func-def", format!("{cell} is not a datatype name")),
        }
    }
    kinds
}

/// Generate an interpreted function from spec and body blocks.
pub fn make_function(
    engine: &Engine,
    name: Option<Symbol>,
    spec: &Cell,
    body: &Cell,
) -> Cell {
    let mut keys_vec = analyze_spec(engine, spec);
    keys_vec.push(
        Typeset::key("return", ParamClass::Return, KindSet::ANY).with_flags(ParamFlags::ENDABLE),
    );
    let keys = KeyList::new(keys_vec);

    let Some(payload) = body.series_payload() else {
        fail(engine, "bad-func-def", "function body must be a block");
    };
    let id = FuncId::fresh();
    let cells = deep_copy_bind(&payload.array, payload.index, &keys, id);
    let body_array = Array::from_cells(cells);
    Cell::function(FuncData::interpreted_with_id(id, name, keys, body_array))
}

/// Deep-copy body cells, rebinding parameter words (and nested arrays)
/// relative to the new function.
fn deep_copy_bind(
    array: &Arc<Array>,
    index: usize,
    keys: &Arc<KeyList>,
    id: FuncId,
) -> Vec<Cell> {
    (index..array.len())
        .map(|i| rebind_cell(array.get(i).expect("body cell in range"), keys, id))
        .collect()
}

fn rebind_cell(mut cell: Cell, keys: &Arc<KeyList>, id: FuncId) -> Cell {
    if let Some(sym) = cell.word_symbol() {
        if keys.index_of(sym).is_some() {
            cell.bind_relative(id);
        }
        return cell;
    }
    if let Some(payload) = cell.series_payload().cloned() {
        let copied = deep_copy_bind(&payload.array, 0, keys, id);
        let mut fresh = cell.retarget_series(Array::from_cells(copied), payload.index);
        fresh.bind_relative(id);
        return fresh;
    }
    cell
}

/// Build a partially specialized function: `fills` pre-load named slots
/// of an exemplar frame. Filling an argument under a refinement
/// activates that refinement.
pub fn specialize(
    engine: &Engine,
    func_cell: &Cell,
    name: Option<Symbol>,
    fills: &[(&str, Cell)],
) -> Cell {
    let Some(payload) = func_cell.as_function() else {
        fail(engine, "not-a-function", "specialize needs a function");
    };
    let original = payload.func.clone();
    let real = original.real();
    let exemplar = Context::with_keys(
        ContextSort::Frame {
            func: real.id,
            stamp: 0,
        },
        original.keys.clone(),
    );
    if let Some(prior) = &original.exemplar {
        for i in 0..prior.len() {
            let fill = prior.get(i).expect("exemplar slot in range");
            exemplar.set(i, fill).expect("fresh exemplar is unlocked");
        }
    }
    for (field, value) in fills {
        let sym = Symbol::intern(field);
        let Some(idx) = original.keys.index_of(sym) else {
            fail(
                engine,
                "bad-refine",
                format!("no {field} parameter to specialize"),
            );
        };
        exemplar
            .set(idx, value.clone())
            .expect("fresh exemplar is unlocked");
        let key = original.keys.get(idx).expect("key index in range");
        if key.class != ParamClass::Refinement {
            // Activate the refinement governing this slot, if any.
            for j in (0..idx).rev() {
                let prior_key = original.keys.get(j).expect("key index in range");
                if prior_key.class == ParamClass::Refinement {
                    if exemplar.get(j).is_some_and(|slot| slot.is_void()) {
                        exemplar
                            .set(j, Cell::logic(true))
                            .expect("fresh exemplar is unlocked");
                    }
                    break;
                }
            }
        }
    }
    Cell::function(FuncData::specialized(name, &original, exemplar))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_block(cells: Vec<Cell>) -> Cell {
        Cell::block(Array::from_cells(cells))
    }

    #[test]
    fn test_spec_dialect_classes() {
        let engine = Engine::new();
        let spec = spec_block(vec![
            Cell::text("doc string"),
            Cell::word("a"),
            Cell::get_word("b"),
            Cell::lit_word("c"),
            Cell::tag("tight"),
            Cell::word("d"),
            Cell::refinement("only"),
            Cell::word("extra"),
            Cell::tag("local"),
            Cell::word("tmp"),
        ]);
        let keys = analyze_spec(&engine, &spec);
        let classes: Vec<ParamClass> = keys.iter().map(|k| k.class).collect();
        assert_eq!(
            classes,
            vec![
                ParamClass::Normal,
                ParamClass::HardQuote,
                ParamClass::SoftQuote,
                ParamClass::Tight,
                ParamClass::Refinement,
                ParamClass::Normal,
                ParamClass::Local,
            ]
        );
    }

    #[test]
    fn test_type_blocks_narrow_typesets() {
        let engine = Engine::new();
        let spec = spec_block(vec![
            Cell::word("value"),
            Cell::block(Array::from_cells(vec![
                Cell::word("integer!"),
                Cell::word("block!"),
            ])),
        ]);
        let keys = analyze_spec(&engine, &spec);
        assert!(keys[0].accepts(Kind::Integer));
        assert!(keys[0].accepts(Kind::Block));
        assert!(!keys[0].accepts(Kind::Text));
    }

    #[test]
    fn test_bodies_bind_relative() {
        let engine = Engine::new();
        let spec = spec_block(vec![Cell::word("x")]);
        let body = spec_block(vec![Cell::word("x"), Cell::word("unrelated")]);
        let func = make_function(&engine, None, &spec, &body);
        let data = &func.as_function().unwrap().func;
        let vessel_core::FuncBody::Interpreted { body } = &data.body else {
            panic!("expected an interpreted body");
        };
        assert!(body.get(0).unwrap().is_relative(), "param word is relative");
        assert!(
            !body.get(1).unwrap().is_relative(),
            "non-param word is untouched"
        );
    }

    #[test]
    fn test_generated_functions_have_return() {
        let engine = Engine::new();
        let spec = spec_block(vec![Cell::word("x")]);
        let body = spec_block(vec![Cell::word("x")]);
        let func = make_function(&engine, None, &spec, &body);
        let data = &func.as_function().unwrap().func;
        let last = data.keys.get(data.keys.len() - 1).unwrap();
        assert_eq!(last.class, ParamClass::Return);
    }
}
