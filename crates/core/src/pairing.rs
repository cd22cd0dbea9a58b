//! Paired cells: two cells sharing one heap node.
//!
//! Used where exactly two cells travel together — the throw channel's
//! label/argument couple, and host API handles.

use crate::cell::Cell;
use crate::node::TAG_SERIES;
use std::cell::RefCell;
use std::sync::Arc;

#[repr(C)]
pub struct Pairing {
    tag: u8,
    first: RefCell<Cell>,
    second: RefCell<Cell>,
}

impl Pairing {
    pub fn new(first: Cell, second: Cell) -> Arc<Pairing> {
        Arc::new(Pairing {
            tag: TAG_SERIES,
            first: RefCell::new(first),
            second: RefCell::new(second),
        })
    }

    pub fn first(&self) -> Cell {
        self.first.borrow().clone()
    }

    pub fn second(&self) -> Cell {
        self.second.borrow().clone()
    }

    pub fn set_first(&self, cell: Cell) {
        *self.first.borrow_mut() = cell;
    }

    pub fn set_second(&self, cell: Cell) {
        *self.second.borrow_mut() = cell;
    }
}

impl std::fmt::Debug for Pairing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pairing({:?}, {:?})", self.first(), self.second())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{PointerClass, classify_pointer};

    #[test]
    fn test_pairing_round_trip() {
        let pair = Pairing::new(Cell::word("label"), Cell::integer(5));
        assert_eq!(pair.first(), Cell::word("label"));
        assert_eq!(pair.second(), Cell::integer(5));
        pair.set_second(Cell::blank());
        assert_eq!(pair.second(), Cell::blank());
    }

    #[test]
    fn test_pairing_is_a_series_node() {
        let pair = Pairing::new(Cell::end(), Cell::end());
        let class = unsafe { classify_pointer(Arc::as_ptr(&pair) as *const u8) };
        assert_eq!(class, PointerClass::Series);
    }
}
