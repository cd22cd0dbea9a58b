//! Typesets and parameter keys.
//!
//! A typeset is a 64-bit mask of admissible kinds. Parameter keys are
//! typesets augmented with the key's symbol, a parameter class (how the
//! argument is gathered at the call site), and per-key flags.

use crate::kind::{Kind, KindSet};
use crate::symbol::Symbol;
use bitflags::bitflags;

/// How an argument for this parameter is obtained at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Fully evaluated.
    Normal,
    /// Evaluated with no lookahead: enfix-blind on the right, and the
    /// owning function refuses to defer when it is itself enfixed.
    Tight,
    /// Taken literally from the source cell.
    HardQuote,
    /// Literal unless the source is a group, get-word, or get-path,
    /// which evaluate.
    SoftQuote,
    /// Introduces a refinement; following parameters belong to it until
    /// the next refinement.
    Refinement,
    /// Not consumed from the call site; pre-initialized to void.
    Local,
    /// Pre-filled with a definitionally-scoped exit function.
    Return,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u8 {
        /// Not visible through frame reflection.
        const HIDDEN = 1 << 0;
        /// Never picked up by binding operations.
        const UNBINDABLE = 1 << 1;
        /// Consumes the rest of the feed (reified into a block).
        const VARIADIC = 1 << 2;
        /// May be absent; arrives as void when the input ends.
        const ENDABLE = 1 << 3;
        /// Argument storage survives the call for later inspection.
        const DURABLE = 1 << 4;
    }
}

/// A typeset cell payload; with `key` present it is a parameter key.
#[derive(Debug, Clone, PartialEq)]
pub struct Typeset {
    pub kinds: KindSet,
    pub key: Option<Symbol>,
    pub class: ParamClass,
    pub flags: ParamFlags,
}

impl Typeset {
    /// A bare typeset value (no key).
    pub fn anonymous(kinds: KindSet) -> Typeset {
        Typeset {
            kinds,
            key: None,
            class: ParamClass::Normal,
            flags: ParamFlags::empty(),
        }
    }

    /// A parameter key.
    pub fn key(symbol: impl Into<Symbol>, class: ParamClass, kinds: KindSet) -> Typeset {
        Typeset {
            kinds,
            key: Some(symbol.into()),
            class,
            flags: ParamFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: ParamFlags) -> Typeset {
        self.flags |= flags;
        self
    }

    pub fn accepts(&self, kind: Kind) -> bool {
        self.kinds.contains(kind)
    }

    pub fn is_endable(&self) -> bool {
        self.flags.contains(ParamFlags::ENDABLE)
    }

    pub fn is_variadic(&self) -> bool {
        self.flags.contains(ParamFlags::VARIADIC)
    }

    /// True for classes that consume from the call site.
    pub fn takes_argument(&self) -> bool {
        matches!(
            self.class,
            ParamClass::Normal | ParamClass::Tight | ParamClass::HardQuote | ParamClass::SoftQuote
        )
    }
}
