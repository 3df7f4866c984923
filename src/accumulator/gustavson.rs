//! Gustavson accumulator: one slot per row of the output vector
//!
//! Used when a vector's flop count is a large share of its length, or when
//! the output vector is short enough that a dense scratch row fits in
//! cache.

use crate::accumulator::{allowed, slot_state, Accumulator, Insert, MaskMode, SlotState};
use crate::semiring::{AddOp, Scalar};

/// Dense scratch row over borrowed arena storage
pub struct GustavsonTable<'a, T> {
    /// Generation flags, one per row
    flags: &'a mut [u64],

    /// Accumulated values; empty for pattern-only work
    values: &'a mut [T],

    mark: u64,
    count: usize,
}

impl<'a, T: Scalar> GustavsonTable<'a, T> {
    /// Wrap arena slices; `values` is either empty or as long as `flags`
    pub fn new(flags: &'a mut [u64], values: &'a mut [T]) -> Self {
        Self {
            flags,
            values,
            mark: 0,
            count: 0,
        }
    }

    /// Number of rows the table covers
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    #[inline]
    fn state(&self, i: usize) -> SlotState {
        slot_state(self.flags[i], self.mark)
    }

    /// Rows present in the current vector, in ascending order
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        let mark = self.mark;
        self.flags
            .iter()
            .enumerate()
            .filter(move |(_, &f)| f > mark)
            .map(|(i, _)| i)
    }
}

impl<T: Scalar> Accumulator<T> for GustavsonTable<'_, T> {
    fn next_vector(&mut self) {
        self.mark += 2;
        self.count = 0;
    }

    #[inline]
    fn scatter_mask(&mut self, i: usize) {
        if self.flags[i] < self.mark {
            self.flags[i] = self.mark;
        }
    }

    #[inline]
    fn mark(&mut self, i: usize, mode: MaskMode) -> Insert {
        let state = self.state(i);
        if state == SlotState::Present {
            return Insert::Existing;
        }
        if !allowed(state, mode) {
            return Insert::Blocked;
        }
        self.flags[i] = self.mark + 1;
        self.count += 1;
        Insert::New
    }

    #[inline]
    fn upsert<A: AddOp<T>, F: FnOnce() -> T>(
        &mut self,
        i: usize,
        mode: MaskMode,
        add: &A,
        t: F,
    ) -> Insert {
        let outcome = self.mark(i, mode);
        if self.values.is_empty() {
            return outcome;
        }
        match outcome {
            Insert::New => self.values[i] = t(),
            Insert::Existing if !A::IS_ANY => {
                let cij = self.values[i];
                if !add.is_terminal(cij) {
                    self.values[i] = add.add(cij, t());
                }
            }
            _ => {}
        }
        outcome
    }

    #[inline]
    fn value_at(&self, i: usize) -> T {
        self.values.get(i).copied().unwrap_or_default()
    }

    fn present(&self) -> usize {
        self.count
    }

    fn for_each_present(&self, mut f: impl FnMut(usize, T)) {
        for i in self.rows() {
            f(i, self.value_at(i));
        }
    }
}
