//! Per-slot buffer arenas (spec §3, "Buffers").
//!
//! Each arena is a flat, pre-allocated, 64-byte-aligned region indexed by
//! `(slot, symbol, user|antenna, block)`. Exactly one producer writes
//! each cell, and readers only consult a cell after observing its
//! guarding counter (`FrameWindowCounters`) reach threshold — the
//! acquire/release pairing on that counter is what makes a raw, unlocked
//! write through `&self` sound (spec §5, "Shared-resource policy").
//! `Cell<T>` provides that externally-synchronized interior mutability
//! without any locking on the hot path.

use std::cell::Cell;

use num_complex::Complex32;

/// A 64-byte aligned, externally-synchronized cell.
#[repr(align(64))]
pub struct AlignedCell<T>(Cell<T>);

// Safety: no instance used for unsynchronized data access. Callers only
// ever write a given cell from the single doer whose upstream gate has
// just opened for that `(slot, symbol, idx)`, and only read it after
// observing the corresponding counter at threshold — the counter's
// acquire/release ordering is the synchronization edge.
unsafe impl<T: Send> Sync for AlignedCell<T> {}

impl<T: Copy + Default> Default for AlignedCell<T> {
    fn default() -> Self {
        AlignedCell(Cell::new(T::default()))
    }
}

/// Fixed-size arena addressable by `(slot, symbol, index)`, where `index`
/// is an antenna id, user id, or subcarrier-block id depending on the
/// buffer's role.
pub struct SlotArena<T> {
    max_symbols: usize,
    per_symbol: usize,
    cells: Vec<AlignedCell<T>>,
}

impl<T: Copy + Default + Send> SlotArena<T> {
    pub fn new(window: usize, max_symbols: usize, per_symbol: usize) -> Self {
        let len = window * max_symbols * per_symbol;
        let mut cells = Vec::with_capacity(len);
        cells.resize_with(len, AlignedCell::default);
        Self {
            max_symbols,
            per_symbol,
            cells,
        }
    }

    fn index(&self, slot: usize, symbol: usize, idx: usize) -> usize {
        (slot * self.max_symbols + symbol) * self.per_symbol + idx
    }

    /// Read a cell. Only call after the counter gating this cell has been
    /// observed at threshold.
    pub fn get(&self, slot: usize, symbol: usize, idx: usize) -> T {
        self.cells[self.index(slot, symbol, idx)].0.get()
    }

    /// Write a cell through a shared reference. Sound only because the
    /// caller (a `Doer`) is handed this `(slot, symbol, idx)` exactly once
    /// per gate opening by the scheduler — see module docs.
    pub fn set(&self, slot: usize, symbol: usize, idx: usize, value: T) {
        self.cells[self.index(slot, symbol, idx)].0.set(value);
    }
}

/// Complex-IQ sample arena used for raw RX, FFT, CSI, equalized, and
/// precoded/TX buffers.
pub type IqArena = SlotArena<Complex32>;

/// Bit-level arena used for demodulated soft bits, decoded bits, and
/// encoded bits (stored as bytes for simplicity).
pub type BitArena = SlotArena<u8>;
