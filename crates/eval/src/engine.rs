//! The engine: one interpreter instance.
//!
//! An engine owns everything a single evaluator thread owns — the data
//! stack, the chunk stack, the thrown-value slot, the frame-info chain
//! used for error reporting, and the recursion-depth probe. Multiple
//! engines may coexist; they share nothing but the symbol interner.
//!
//! All state is interior-mutable so frames can borrow the engine shared
//! while their RAII cleanup runs on normal exit and fail-unwind alike.

use crate::stacks::ChunkStack;
use std::cell::{Cell as StateCell, RefCell};
use std::sync::Arc;
use vessel_core::{Cell, Pairing, Symbol};

/// Tuning knobs, in the shape of a plain builder.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum evaluator recursion depth before a stack-overflow failure.
    pub max_depth: usize,
    /// Initial data-stack capacity.
    pub data_stack_capacity: usize,
    /// Initial chunk-stack capacity, in cells.
    pub chunk_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            max_depth: 512,
            data_stack_capacity: 128,
            chunk_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn new() -> EngineConfig {
        EngineConfig::default()
    }

    pub fn with_max_depth(mut self, depth: usize) -> EngineConfig {
        self.max_depth = depth;
        self
    }

    pub fn with_data_stack_capacity(mut self, capacity: usize) -> EngineConfig {
        self.data_stack_capacity = capacity;
        self
    }

    pub fn with_chunk_capacity(mut self, capacity: usize) -> EngineConfig {
        self.chunk_capacity = capacity;
        self
    }
}

/// One entry of the frame chain, kept for error "where" reporting.
#[derive(Debug, Clone)]
pub(crate) struct FrameInfo {
    pub(crate) label: Option<Symbol>,
}

pub struct Engine {
    pub(crate) ds: RefCell<Vec<Cell>>,
    pub(crate) chunk: RefCell<ChunkStack>,
    pub(crate) thrown: RefCell<Option<Arc<Pairing>>>,
    pub(crate) depth: StateCell<usize>,
    pub(crate) infos: RefCell<Vec<FrameInfo>>,
    next_stamp: StateCell<u64>,
    pub(crate) config: EngineConfig,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Engine {
        Engine {
            ds: RefCell::new(Vec::with_capacity(config.data_stack_capacity)),
            chunk: RefCell::new(ChunkStack::with_capacity(config.chunk_capacity)),
            thrown: RefCell::new(None),
            depth: StateCell::new(0),
            infos: RefCell::new(Vec::new()),
            next_stamp: StateCell::new(1),
            config,
        }
    }

    /// Current data-stack depth.
    pub fn dsp(&self) -> usize {
        self.ds.borrow().len()
    }

    pub(crate) fn ds_push(&self, cell: Cell) {
        self.ds.borrow_mut().push(cell);
    }

    pub(crate) fn ds_pop(&self) -> Option<Cell> {
        self.ds.borrow_mut().pop()
    }

    pub(crate) fn ds_get(&self, index: usize) -> Cell {
        self.ds.borrow()[index].clone()
    }

    pub(crate) fn ds_remove(&self, index: usize) -> Cell {
        self.ds.borrow_mut().remove(index)
    }

    pub(crate) fn ds_truncate(&self, mark: usize) {
        self.ds.borrow_mut().truncate(mark);
    }

    /// Per-call stamp used by definitionally scoped exits.
    pub(crate) fn fresh_stamp(&self) -> u64 {
        let stamp = self.next_stamp.get();
        self.next_stamp.set(stamp + 1);
        stamp
    }

    /// Is a throw in flight? At most one ever is; every evaluation step
    /// begins by asserting this is clear.
    pub fn thrown_pending(&self) -> bool {
        self.thrown.borrow().is_some()
    }

    /// The label of the throw in flight, if any.
    pub fn thrown_label(&self) -> Option<Cell> {
        self.thrown.borrow().as_ref().map(|pair| pair.first())
    }

    /// Consume the throw in flight: returns (label, value) and clears the
    /// slot. The caller either uses the value (catch), re-stashes it
    /// (rethrow), or escalates to a failure.
    pub fn take_thrown(&self) -> Option<(Cell, Cell)> {
        self.thrown
            .borrow_mut()
            .take()
            .map(|pair| (pair.first(), pair.second()))
    }

    pub(crate) fn stash_thrown(&self, label: Cell, value: Cell) {
        let prior = self.thrown.borrow_mut().replace(Pairing::new(label, value));
        assert!(prior.is_none(), "a second throw was raised while one was in flight");
    }

    /// Labels of the live frames, newest last. Error values capture this
    /// as their `where` field.
    pub(crate) fn where_labels(&self) -> Vec<Option<Symbol>> {
        self.infos.borrow().iter().map(|info| info.label).collect()
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}
