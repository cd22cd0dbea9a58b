//! Interned symbols.
//!
//! Word spellings intern once into a process-wide `lasso` rodeo and are
//! represented by two keys: the spelling as written and the canonical
//! (case-folded) form. Word equality is canonical-key equality, so `Foo`
//! and `foo` name the same variable while round-tripping their original
//! spelling.

use lasso::{Spur, ThreadedRodeo};
use std::fmt;
use std::sync::LazyLock;

static RODEO: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// An interned word spelling plus its canonical form.
#[derive(Clone, Copy, Eq)]
pub struct Symbol {
    spelling: Spur,
    canon: Spur,
}

impl Symbol {
    pub fn intern(text: &str) -> Symbol {
        let spelling = RODEO.get_or_intern(text);
        let folded = text.to_lowercase();
        let canon = if folded == text {
            spelling
        } else {
            RODEO.get_or_intern(&folded)
        };
        Symbol { spelling, canon }
    }

    /// The spelling as originally written.
    pub fn as_str(&self) -> &'static str {
        RODEO.resolve(&self.spelling)
    }

    /// The case-folded canonical spelling.
    pub fn canon_str(&self) -> &'static str {
        RODEO.resolve(&self.canon)
    }

    /// Exact-spelling comparison (aliases compare equal under `==`).
    pub fn same_spelling(&self, other: &Symbol) -> bool {
        self.spelling == other.spelling
    }
}

// Equality and hashing go through the canonical key only.
impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.canon == other.canon
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canon.hash(state);
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Symbol {
        Symbol::intern(text)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
