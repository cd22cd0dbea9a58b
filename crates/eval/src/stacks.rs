//! The chunk stack: a bump region of argument rows.
//!
//! Each non-durable function call pushes a row of argument cells here and
//! records the region length as its marker; dropping the frame truncates
//! back to the marker. Rows start as trash so a read of a slot fulfilment
//! never reached is caught as the bug it is.
//!
//! Promotion — moving a row into a heap varlist so it can outlive the
//! call — copies the cells out; the region slot is then dead weight until
//! the frame's truncation reclaims it.

use vessel_core::Cell;

pub(crate) struct ChunkStack {
    cells: Vec<Cell>,
}

impl ChunkStack {
    pub(crate) fn with_capacity(capacity: usize) -> ChunkStack {
        ChunkStack {
            cells: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Push a row of `len` trash cells; returns the row's base offset.
    pub(crate) fn push_row(&mut self, len: usize) -> usize {
        let base = self.cells.len();
        self.cells.extend(std::iter::repeat_with(Cell::trash).take(len));
        base
    }

    pub(crate) fn get(&self, index: usize) -> Cell {
        self.cells[index].clone()
    }

    pub(crate) fn set(&mut self, index: usize, cell: Cell) {
        self.cells[index] = cell;
    }

    /// Copy a row out for promotion into a varlist.
    pub(crate) fn copy_row(&self, base: usize, len: usize) -> Vec<Cell> {
        self.cells[base..base + len].to_vec()
    }

    /// Reset to a frame's marker, dropping every row above it.
    pub(crate) fn truncate(&mut self, mark: usize) {
        self.cells.truncate(mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_lifo() {
        let mut chunk = ChunkStack::with_capacity(8);
        let outer = chunk.push_row(2);
        chunk.set(outer, Cell::integer(1));
        let inner = chunk.push_row(1);
        chunk.set(inner, Cell::integer(2));
        assert_eq!(chunk.len(), 3);

        chunk.truncate(inner);
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.get(outer), Cell::integer(1));
        chunk.truncate(outer);
        assert_eq!(chunk.len(), 0);
    }

    #[test]
    fn test_fresh_rows_hold_trash() {
        let mut chunk = ChunkStack::with_capacity(4);
        let base = chunk.push_row(2);
        assert!(chunk.get(base).is_trash());
        assert!(chunk.get(base + 1).is_trash());
    }
}
