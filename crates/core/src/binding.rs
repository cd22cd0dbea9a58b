//! Word and array binding.
//!
//! A word (or array) cell is *specific* when its binding names a context
//! directly, and *relative* when it names a function identity: the actual
//! variable lives in whichever call frame of that function is running
//! when the cell is dereferenced. Relative cells exist only inside the
//! deep-copied body of their function; resolving one requires a
//! *specifier*, the frame context of a matching call.

use crate::context::Context;
use crate::func::FuncId;
use std::sync::Arc;

#[derive(Clone)]
pub enum Binding {
    /// No binding; dereferencing is an error.
    Unbound,
    /// Bound into a known context.
    Specific(Arc<Context>),
    /// Bound relative to a function; needs a frame specifier to resolve.
    Relative(FuncId),
}

impl Binding {
    pub fn is_relative(&self) -> bool {
        matches!(self, Binding::Relative(_))
    }

    pub fn is_unbound(&self) -> bool {
        matches!(self, Binding::Unbound)
    }

    /// Resolve to a specific context, consulting the specifier when the
    /// binding is relative.
    ///
    /// Panics when a relative binding meets a missing or mismatched
    /// specifier: that cell escaped its function body, which is a
    /// corruption, not a user error.
    pub fn resolve(&self, specifier: &Specifier) -> Option<Arc<Context>> {
        match self {
            Binding::Unbound => None,
            Binding::Specific(ctx) => Some(ctx.clone()),
            Binding::Relative(func) => {
                let ctx = specifier
                    .as_ref()
                    .unwrap_or_else(|| panic!("relative binding resolved without a specifier"));
                assert!(
                    ctx.matches_frame(*func),
                    "relative binding resolved against a frame of the wrong function"
                );
                Some(ctx.clone())
            }
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Unbound => write!(f, "Unbound"),
            Binding::Specific(_) => write!(f, "Specific"),
            Binding::Relative(id) => write!(f, "Relative({id:?})"),
        }
    }
}

/// The context used to resolve relatively-bound cells fetched from an
/// array. `None` means the array is fully specific.
pub type Specifier = Option<Arc<Context>>;
