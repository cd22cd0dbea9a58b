//! Vessel Core: the value model of the Vessel language.
//!
//! This crate holds the two leaf layers of the interpreter — the tagged
//! value cell and the heap objects reachable from cells — with no
//! knowledge of frames or evaluation:
//!
//! - `node`: node-tag bytes and the pointer-kind oracle
//! - `kind`: the kind enumeration and 64-bit kind sets
//! - `symbol`: interned word spellings with canonical forms
//! - `cell`: the fixed-size value cell and its content sum
//! - `binding`: relative/specific word binding and specifiers
//! - `array`: heap cell arrays with run/hold locks
//! - `context`: keyed variable stores (objects, errors, frames)
//! - `typeset`: kind masks and parameter keys
//! - `func`: function values, specializations, identities
//! - `pairing`: two-cell heap nodes
//! - `error`: structural errors the evaluator maps to language errors

pub mod array;
pub mod binding;
pub mod cell;
pub mod context;
pub mod error;
pub mod func;
pub mod kind;
pub mod node;
pub mod pairing;
pub mod symbol;
pub mod typeset;

pub use array::{Array, ArrayFlags, HoldGuard, RunningGuard};
pub use binding::{Binding, Specifier};
pub use cell::{CELL_SIZE, Cell, CellFlags, Content, FunctionPayload, SeriesPayload, WordPayload};
pub use context::{Context, ContextSort, KeyList};
pub use error::CoreError;
pub use func::{FuncBody, FuncData, FuncFlags, FuncId};
pub use kind::{ANY_ARRAY, ANY_CONTEXT, ANY_NUMBER, ANY_WORD, KIND_COUNT, Kind, KindSet};
pub use node::{EndSignal, END_SIGNAL, PointerClass, classify_pointer};
pub use pairing::Pairing;
pub use symbol::Symbol;
pub use typeset::{ParamClass, ParamFlags, Typeset};
