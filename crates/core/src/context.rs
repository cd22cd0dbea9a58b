//! Contexts: keyed variable stores.
//!
//! A context pairs a varlist (an array of value cells, voids legal) with
//! a keylist (shared, immutable parameter keys). Objects, errors, and
//! call frames are all contexts; frames additionally remember which
//! function they instantiate and a per-call stamp so definitionally
//! scoped exits can find their way home.
//!
//! Keylists are shared: specializations and the frames of one function
//! all point at the same `KeyList` allocation.

use crate::array::{Array, ArrayFlags, HoldGuard};
use crate::cell::Cell;
use crate::error::CoreError;
use crate::func::FuncId;
use crate::kind::KindSet;
use crate::node::TAG_SERIES;
use crate::symbol::Symbol;
use crate::typeset::{ParamClass, Typeset};
use std::sync::Arc;

/// Immutable, shareable list of parameter keys.
#[derive(Debug)]
pub struct KeyList {
    keys: Vec<Typeset>,
}

impl KeyList {
    pub fn new(keys: Vec<Typeset>) -> Arc<KeyList> {
        Arc::new(KeyList { keys })
    }

    pub fn empty() -> Arc<KeyList> {
        KeyList::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Typeset> {
        self.keys.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Typeset> {
        self.keys.iter()
    }

    /// Index of the key whose symbol matches canonically.
    pub fn index_of(&self, symbol: Symbol) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| k.key.map(|s| s == symbol).unwrap_or(false))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSort {
    Object,
    Error,
    Frame { func: FuncId, stamp: u64 },
}

#[repr(C)]
pub struct Context {
    tag: u8,
    sort: ContextSort,
    vars: Arc<Array>,
    keys: Arc<KeyList>,
}

impl Context {
    /// A context over an existing keylist, all slots void.
    pub fn with_keys(sort: ContextSort, keys: Arc<KeyList>) -> Arc<Context> {
        let vars = Array::with_flags(
            ArrayFlags::VARLIST | ArrayFlags::VOIDS_LEGAL,
            vec![Cell::void(); keys.len()],
        );
        Arc::new(Context {
            tag: TAG_SERIES,
            sort,
            vars,
            keys,
        })
    }

    /// Convenience object builder: plain keys admitting any value.
    pub fn object(fields: Vec<(&str, Cell)>) -> Arc<Context> {
        let keys = fields
            .iter()
            .map(|(name, _)| Typeset::key(*name, ParamClass::Normal, KindSet::ANY))
            .collect();
        let ctx = Context::with_keys(ContextSort::Object, KeyList::new(keys));
        for (i, (_, value)) in fields.into_iter().enumerate() {
            ctx.set(i, value).expect("fresh object is unlocked");
        }
        ctx
    }

    pub fn sort(&self) -> &ContextSort {
        &self.sort
    }

    pub fn keys(&self) -> &Arc<KeyList> {
        &self.keys
    }

    pub fn vars(&self) -> &Arc<Array> {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn index_of(&self, symbol: Symbol) -> Option<usize> {
        self.keys.index_of(symbol)
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.vars.get(index)
    }

    /// Write a slot. Honors the varlist HOLD write-lock.
    pub fn set(&self, index: usize, value: Cell) -> Result<(), CoreError> {
        self.vars.set_var(index, value)
    }

    pub fn select(&self, symbol: Symbol) -> Option<Cell> {
        self.index_of(symbol).and_then(|i| self.get(i))
    }

    /// Write by name; `Ok(false)` when the key is absent.
    pub fn update(&self, symbol: Symbol, value: Cell) -> Result<bool, CoreError> {
        match self.index_of(symbol) {
            Some(i) => {
                self.set(i, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The write-hold placed on a frame varlist while a native runs.
    pub fn hold(&self) -> HoldGuard {
        HoldGuard::lock(&self.vars)
    }

    pub fn frame_func(&self) -> Option<FuncId> {
        match self.sort {
            ContextSort::Frame { func, .. } => Some(func),
            _ => None,
        }
    }

    pub fn frame_stamp(&self) -> Option<u64> {
        match self.sort {
            ContextSort::Frame { stamp, .. } => Some(stamp),
            _ => None,
        }
    }

    /// Does this frame context instantiate the given function?
    pub fn matches_frame(&self, id: FuncId) -> bool {
        self.frame_func() == Some(id)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Context({:?}, len={})", self.sort, self.len())
    }
}
