//! The datum iterator contract and an in-memory implementation.

use crate::input::Input;

/// A finite, restartable, ordered sequence of datums.
///
/// `reset` rewinds the cursor to before the first datum; `next` advances
/// it and reports whether a datum is available at the new position.
/// `len` and `datum_n` give positional access for one-shot enumeration.
pub trait DatumIterator: Send {
    /// Rewind the cursor to before the first datum.
    fn reset(&mut self);

    /// Advance the cursor, returning false once the sequence is exhausted.
    fn next(&mut self) -> bool;

    /// The input tuple at the current cursor position. Empty before the
    /// first `next` after a reset.
    fn datum(&self) -> &[Input];

    /// Total number of datums in the sequence.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The input tuple at position `n`, independent of the cursor.
    /// Panics if `n >= len()`.
    fn datum_n(&self, n: usize) -> &[Input];
}

/// Datum iterator over a fixed in-memory list of tuples.
pub struct ListDatumIterator {
    datums: Vec<Vec<Input>>,
    // 1-based cursor; 0 means before the first datum.
    pos: usize,
}

impl ListDatumIterator {
    pub fn new(datums: Vec<Vec<Input>>) -> Self {
        Self { datums, pos: 0 }
    }
}

impl DatumIterator for ListDatumIterator {
    fn reset(&mut self) {
        self.pos = 0;
    }

    fn next(&mut self) -> bool {
        if self.pos < self.datums.len() {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn datum(&self) -> &[Input] {
        if self.pos == 0 {
            &[]
        } else {
            &self.datums[self.pos - 1]
        }
    }

    fn len(&self) -> usize {
        self.datums.len()
    }

    fn datum_n(&self, n: usize) -> &[Input] {
        &self.datums[n]
    }
}
