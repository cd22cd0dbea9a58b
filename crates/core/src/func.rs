//! Function values.
//!
//! A function is a keylist (the facade its callers see), a body, and
//! flags. Specializations wrap an underlying function and carry an
//! exemplar frame whose non-void slots pre-fill arguments at call time;
//! the chain from a visible function to the one that really dispatches
//! is cached so arity lookups stay a field walk, not a search.
//!
//! Native bodies store their dispatcher as a raw `usize`: the dispatcher
//! signature lives in the evaluator crate, which transmutes it back. The
//! evaluator is the only creator and the only caller of these values.

use crate::array::Array;
use crate::context::{Context, KeyList};
use crate::symbol::Symbol;
use crate::typeset::{ParamClass, Typeset};
use bitflags::bitflags;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a function, independent of any `Arc` address. Relative
/// bindings name functions by id, and frame contexts record the id of
/// the function they instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(u64);

static NEXT_FUNC_ID: AtomicU64 = AtomicU64::new(1);

impl FuncId {
    pub fn fresh() -> FuncId {
        FuncId(NEXT_FUNC_ID.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FuncFlags: u8 {
        /// Argument storage is a heap varlist surviving the call.
        const DURABLE = 1 << 0;
        /// The evaluator splices this function's argument back into the
        /// feed instead of dispatching (the `eval` native).
        const EVAL_SPLICE = 1 << 1;
        /// Invoking this function throws a definitional return aimed at
        /// the frame its cell is bound to.
        const DEFINITIONAL_RETURN = 1 << 2;
    }
}

#[derive(Debug)]
pub enum FuncBody {
    /// A dispatcher in the evaluator crate, stored type-erased.
    Native { dispatcher: usize },
    /// A deep-copied block whose words are bound relative to this
    /// function's id.
    Interpreted { body: Arc<Array> },
    /// No body of its own; the exemplar plus the underlying function
    /// carry the behavior.
    Specialized,
}

pub struct FuncData {
    pub id: FuncId,
    pub name: Option<Symbol>,
    /// The facade: the keylist callers fulfil against.
    pub keys: Arc<KeyList>,
    pub body: FuncBody,
    pub flags: FuncFlags,
    /// Pre-filled argument frame for specializations.
    pub exemplar: Option<Arc<Context>>,
    /// The function that actually dispatches, for specializations.
    pub underlying: Option<Arc<FuncData>>,
}

impl FuncData {
    pub fn native(
        name: &str,
        keys: Arc<KeyList>,
        dispatcher: usize,
        flags: FuncFlags,
    ) -> Arc<FuncData> {
        Arc::new(FuncData {
            id: FuncId::fresh(),
            name: Some(Symbol::intern(name)),
            keys,
            body: FuncBody::Native { dispatcher },
            flags,
            exemplar: None,
            underlying: None,
        })
    }

    pub fn interpreted(name: Option<Symbol>, keys: Arc<KeyList>, body: Arc<Array>) -> Arc<FuncData> {
        Arc::new(FuncData {
            id: FuncId::fresh(),
            name,
            keys,
            body: FuncBody::Interpreted { body },
            flags: FuncFlags::empty(),
            exemplar: None,
            underlying: None,
        })
    }

    /// Note: the interpreted body must be bound relative to the id this
    /// returns, so creation happens in two steps there (see the function
    /// generator in the evaluator crate).
    pub fn interpreted_with_id(
        id: FuncId,
        name: Option<Symbol>,
        keys: Arc<KeyList>,
        body: Arc<Array>,
    ) -> Arc<FuncData> {
        Arc::new(FuncData {
            id,
            name,
            keys,
            body: FuncBody::Interpreted { body },
            flags: FuncFlags::empty(),
            exemplar: None,
            underlying: None,
        })
    }

    pub fn specialized(
        name: Option<Symbol>,
        base: &Arc<FuncData>,
        exemplar: Arc<Context>,
    ) -> Arc<FuncData> {
        Arc::new(FuncData {
            id: FuncId::fresh(),
            name,
            keys: base.keys.clone(),
            body: FuncBody::Specialized,
            flags: base.flags & FuncFlags::DURABLE,
            exemplar: Some(exemplar),
            underlying: Some(base.real()),
        })
    }

    /// Follow the underlying chain to the function that dispatches.
    pub fn real(self: &Arc<Self>) -> Arc<FuncData> {
        let mut cursor = self.clone();
        while let Some(under) = &cursor.underlying {
            cursor = under.clone();
        }
        cursor
    }

    pub fn num_params(&self) -> usize {
        self.keys.len()
    }

    /// The first parameter that takes an argument from the call site:
    /// the left argument slot of a lookback dispatch.
    pub fn first_param(&self) -> Option<(usize, &Typeset)> {
        self.keys
            .iter()
            .enumerate()
            .find(|(_, k)| k.takes_argument() || k.class == ParamClass::Refinement)
    }

    pub fn is_durable(&self) -> bool {
        self.flags.contains(FuncFlags::DURABLE)
    }
}

impl PartialEq for FuncData {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Debug for FuncData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            Some(name) => write!(f, "FuncData({name}, {:?})", self.id),
            None => write!(f, "FuncData(anonymous, {:?})", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::KindSet;

    fn one_param_keys() -> Arc<KeyList> {
        KeyList::new(vec![Typeset::key(
            "value",
            ParamClass::Normal,
            KindSet::ANY_VALUE,
        )])
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(FuncId::fresh(), FuncId::fresh());
    }

    #[test]
    fn test_specialization_chain_resolves_to_root() {
        let base = FuncData::native("base", one_param_keys(), 0, FuncFlags::empty());
        let exemplar = Context::with_keys(
            crate::context::ContextSort::Frame {
                func: base.id,
                stamp: 0,
            },
            base.keys.clone(),
        );
        let once = FuncData::specialized(None, &base, exemplar.clone());
        let twice = FuncData::specialized(None, &once, exemplar);
        assert_eq!(twice.real().id, base.id);
        assert!(Arc::ptr_eq(&twice.keys, &base.keys), "facade is shared");
    }

    #[test]
    fn test_first_param_skips_locals() {
        let keys = KeyList::new(vec![
            Typeset::key("out", ParamClass::Local, KindSet::ANY),
            Typeset::key("left", ParamClass::Normal, KindSet::ANY_VALUE),
        ]);
        let func = FuncData::native("f", keys, 0, FuncFlags::empty());
        let (index, key) = func.first_param().unwrap();
        assert_eq!(index, 1);
        assert_eq!(key.key.unwrap(), crate::symbol::Symbol::intern("left"));
    }
}
