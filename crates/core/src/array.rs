//! Heap arrays of cells.
//!
//! An array owns its cells behind interior mutability and carries a flag
//! word. Two flags are locks: `RUNNING` is the read-lock the evaluator
//! takes while walking an array (mutating a running array faults — there
//! is no modify-while-iterating), and `HOLD` is the write-lock placed on
//! a frame varlist while a native executes. Both are taken through RAII
//! guards so a fail-unwind releases them.

use crate::cell::Cell;
use crate::error::CoreError;
use crate::node::TAG_SERIES;
use bitflags::bitflags;
use std::cell::{Cell as StateCell, RefCell};
use std::sync::Arc;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArrayFlags: u16 {
        /// The evaluator is walking this array; mutation faults.
        const RUNNING = 1 << 0;
        /// A native holds this varlist; mutation faults.
        const HOLD = 1 << 1;
        /// Void cells are legal members (varlists only).
        const VOIDS_LEGAL = 1 << 2;
        /// This array is the variable store of a context.
        const VARLIST = 1 << 3;
        /// Reified from a variadic feed whose earlier items were already
        /// consumed.
        const TRUNCATED = 1 << 4;
        /// The scanner saw a newline before the closing bracket.
        const NEWLINE_AT_TAIL = 1 << 5;
    }
}

#[repr(C)]
pub struct Array {
    tag: u8,
    flags: StateCell<u16>,
    cells: RefCell<Vec<Cell>>,
}

impl Array {
    pub fn new() -> Arc<Array> {
        Array::with_flags(ArrayFlags::empty(), Vec::new())
    }

    pub fn from_cells(cells: Vec<Cell>) -> Arc<Array> {
        Array::with_flags(ArrayFlags::empty(), cells)
    }

    pub fn with_flags(flags: ArrayFlags, cells: Vec<Cell>) -> Arc<Array> {
        Arc::new(Array {
            tag: TAG_SERIES,
            flags: StateCell::new(flags.bits()),
            cells: RefCell::new(cells),
        })
    }

    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.borrow().is_empty()
    }

    /// Copy out the cell at `index`, or `None` past the tail. The copy is
    /// the array-feed fetch primitive: walkers never hold a borrow into
    /// the array across evaluation.
    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.borrow().get(index).cloned()
    }

    pub fn get_flag(&self, flag: ArrayFlags) -> bool {
        ArrayFlags::from_bits_truncate(self.flags.get()).contains(flag)
    }

    pub fn set_flag(&self, flag: ArrayFlags) {
        self.flags.set(self.flags.get() | flag.bits());
    }

    pub fn clear_flag(&self, flag: ArrayFlags) {
        self.flags.set(self.flags.get() & !flag.bits());
    }

    fn check_mutable(&self) -> Result<(), CoreError> {
        if self.get_flag(ArrayFlags::RUNNING) || self.get_flag(ArrayFlags::HOLD) {
            return Err(CoreError::SeriesLocked);
        }
        Ok(())
    }

    fn check_insert(&self, cell: &Cell) -> Result<(), CoreError> {
        if cell.is_void() && !self.get_flag(ArrayFlags::VOIDS_LEGAL) {
            return Err(CoreError::BadVoidInsert);
        }
        Ok(())
    }

    pub fn push(&self, cell: Cell) -> Result<(), CoreError> {
        self.check_mutable()?;
        self.check_insert(&cell)?;
        self.cells.borrow_mut().push(cell);
        Ok(())
    }

    pub fn append_cells(&self, cells: Vec<Cell>) -> Result<(), CoreError> {
        self.check_mutable()?;
        for cell in &cells {
            self.check_insert(cell)?;
        }
        self.cells.borrow_mut().extend(cells);
        Ok(())
    }

    pub fn set(&self, index: usize, cell: Cell) -> Result<(), CoreError> {
        self.check_mutable()?;
        self.check_insert(&cell)?;
        let mut cells = self.cells.borrow_mut();
        let len = cells.len();
        let slot = cells
            .get_mut(index)
            .ok_or(CoreError::OutOfBounds { index, len })?;
        *slot = cell;
        Ok(())
    }

    /// Write a varlist slot regardless of the RUNNING read-lock. Only the
    /// frame machinery uses this; the HOLD write-lock still applies.
    pub fn set_var(&self, index: usize, cell: Cell) -> Result<(), CoreError> {
        if self.get_flag(ArrayFlags::HOLD) {
            return Err(CoreError::SeriesLocked);
        }
        let mut cells = self.cells.borrow_mut();
        let len = cells.len();
        let slot = cells
            .get_mut(index)
            .ok_or(CoreError::OutOfBounds { index, len })?;
        *slot = cell;
        Ok(())
    }

    /// Copy of the whole cell vector (deep-copy and reification support).
    pub fn to_vec(&self) -> Vec<Cell> {
        self.cells.borrow().clone()
    }
}

/// Read-lock guard the evaluator takes on an array it walks. If the flag
/// was already set by an outer walker the guard takes nothing and clears
/// nothing.
pub struct RunningGuard {
    array: Arc<Array>,
    took: bool,
}

impl RunningGuard {
    pub fn lock(array: &Arc<Array>) -> RunningGuard {
        let took = !array.get_flag(ArrayFlags::RUNNING);
        if took {
            array.set_flag(ArrayFlags::RUNNING);
        }
        RunningGuard {
            array: array.clone(),
            took,
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if self.took {
            self.array.clear_flag(ArrayFlags::RUNNING);
        }
    }
}

/// Write-lock guard placed on a frame varlist while a native runs.
pub struct HoldGuard {
    array: Arc<Array>,
    took: bool,
}

impl HoldGuard {
    pub fn lock(array: &Arc<Array>) -> HoldGuard {
        let took = !array.get_flag(ArrayFlags::HOLD);
        if took {
            array.set_flag(ArrayFlags::HOLD);
        }
        HoldGuard {
            array: array.clone(),
            took,
        }
    }
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        if self.took {
            self.array.clear_flag(ArrayFlags::HOLD);
        }
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Array(len={})", self.len())
    }
}
