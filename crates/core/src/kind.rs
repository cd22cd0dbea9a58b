//! The kind enumeration and kind sets.
//!
//! `Kind` is the discriminator a cell answers when asked what it holds.
//! The numbering is dense and stays below 64 so a typeset can describe an
//! admissible set of kinds as one `u64` mask (`KindSet`).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Value kinds, one per datatype the core exercises.
///
/// End markers and trash are not kinds: a cell in either state refuses a
/// kind read entirely (see `Cell::kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Kind {
    Void = 0,
    Blank,
    Logic,
    Bar,
    LitBar,
    Integer,
    Decimal,
    Percent,
    Char,
    Pair,
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,
    Issue,
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,
    Text,
    File,
    Tag,
    Binary,
    Object,
    Error,
    Frame,
    Function,
    Typeset,
    Handle,
}

/// Number of kinds. Must stay at or below 64 for the typeset mask.
pub const KIND_COUNT: u8 = Kind::Handle as u8 + 1;

impl Kind {
    /// This kind's bit in a `KindSet` mask.
    pub const fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    pub const fn is_any_word(self) -> bool {
        matches!(
            self,
            Kind::Word | Kind::SetWord | Kind::GetWord | Kind::LitWord | Kind::Refinement | Kind::Issue
        )
    }

    pub const fn is_any_array(self) -> bool {
        matches!(
            self,
            Kind::Block | Kind::Group | Kind::Path | Kind::SetPath | Kind::GetPath | Kind::LitPath
        )
    }

    pub const fn is_any_path(self) -> bool {
        matches!(self, Kind::Path | Kind::SetPath | Kind::GetPath | Kind::LitPath)
    }

    pub const fn is_any_context(self) -> bool {
        matches!(self, Kind::Object | Kind::Error | Kind::Frame)
    }

    /// Datatype name in source notation, e.g. `integer!`.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Void => "void!",
            Kind::Blank => "blank!",
            Kind::Logic => "logic!",
            Kind::Bar => "bar!",
            Kind::LitBar => "lit-bar!",
            Kind::Integer => "integer!",
            Kind::Decimal => "decimal!",
            Kind::Percent => "percent!",
            Kind::Char => "char!",
            Kind::Pair => "pair!",
            Kind::Word => "word!",
            Kind::SetWord => "set-word!",
            Kind::GetWord => "get-word!",
            Kind::LitWord => "lit-word!",
            Kind::Refinement => "refinement!",
            Kind::Issue => "issue!",
            Kind::Block => "block!",
            Kind::Group => "group!",
            Kind::Path => "path!",
            Kind::SetPath => "set-path!",
            Kind::GetPath => "get-path!",
            Kind::LitPath => "lit-path!",
            Kind::Text => "text!",
            Kind::File => "file!",
            Kind::Tag => "tag!",
            Kind::Binary => "binary!",
            Kind::Object => "object!",
            Kind::Error => "error!",
            Kind::Frame => "frame!",
            Kind::Function => "function!",
            Kind::Typeset => "typeset!",
            Kind::Handle => "handle!",
        }
    }

    /// Inverse of `name`, used by the function-spec dialect's type blocks.
    pub fn from_name(name: &str) -> Option<Kind> {
        let mut k = 0u8;
        while k < KIND_COUNT {
            let kind = Kind::try_from(k).expect("dense kind numbering");
            if kind.name() == name {
                return Some(kind);
            }
            k += 1;
        }
        None
    }
}

/// A set of kinds as a 64-bit mask.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KindSet(u64);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);

    /// Every kind, void included.
    pub const ANY: KindSet = KindSet((1u64 << KIND_COUNT) - 1);

    /// Every kind except void. The default for function parameters: an
    /// argument slot that admits void must say so explicitly.
    pub const ANY_VALUE: KindSet = KindSet(KindSet::ANY.0 & !(1u64 << (Kind::Void as u8)));

    pub const fn of(kinds: &[Kind]) -> KindSet {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            bits |= 1u64 << (kinds[i] as u8);
            i += 1;
        }
        KindSet(bits)
    }

    pub const fn with(self, kind: Kind) -> KindSet {
        KindSet(self.0 | kind.bit())
    }

    pub const fn without(self, kind: Kind) -> KindSet {
        KindSet(self.0 & !kind.bit())
    }

    pub const fn union(self, other: KindSet) -> KindSet {
        KindSet(self.0 | other.0)
    }

    pub const fn contains(self, kind: Kind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn from_bits(bits: u64) -> KindSet {
        KindSet(bits & KindSet::ANY.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Kind> {
        (0..KIND_COUNT).filter_map(move |k| {
            let kind = Kind::try_from(k).expect("dense kind numbering");
            self.contains(kind).then_some(kind)
        })
    }
}

pub const ANY_WORD: KindSet = KindSet::of(&[
    Kind::Word,
    Kind::SetWord,
    Kind::GetWord,
    Kind::LitWord,
    Kind::Refinement,
    Kind::Issue,
]);

pub const ANY_ARRAY: KindSet = KindSet::of(&[
    Kind::Block,
    Kind::Group,
    Kind::Path,
    Kind::SetPath,
    Kind::GetPath,
    Kind::LitPath,
]);

pub const ANY_NUMBER: KindSet = KindSet::of(&[Kind::Integer, Kind::Decimal, Kind::Percent]);

pub const ANY_CONTEXT: KindSet = KindSet::of(&[Kind::Object, Kind::Error, Kind::Frame]);

impl std::fmt::Debug for KindSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
