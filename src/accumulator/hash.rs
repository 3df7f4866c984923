//! Open-addressing hash accumulator
//!
//! Sized to a power of two at least twice the flop estimate of the work it
//! serves, so probe chains stay short. Rows hash with `(i * 257) & (size - 1)`
//! and collisions probe linearly.

use crate::accumulator::{allowed, slot_state, Accumulator, Insert, MaskMode, SlotState};
use crate::constants::HASH_FACTOR;
use crate::semiring::{AddOp, Scalar};

#[inline]
fn hash_of(i: usize, size: usize) -> usize {
    i.wrapping_mul(HASH_FACTOR) & (size - 1)
}

/// Hash table over borrowed arena storage
pub struct HashTable<'a, T> {
    flags: &'a mut [u64],
    keys: &'a mut [usize],
    values: &'a mut [T],
    mark: u64,
    count: usize,
    overflow: bool,
}

impl<'a, T: Scalar> HashTable<'a, T> {
    /// Wrap arena slices; `flags.len()` must be a power of two
    pub fn new(flags: &'a mut [u64], keys: &'a mut [usize], values: &'a mut [T]) -> Self {
        debug_assert!(flags.is_empty() || flags.len().is_power_of_two());
        debug_assert_eq!(flags.len(), keys.len());
        Self {
            flags,
            keys,
            values,
            mark: 0,
            count: 0,
            overflow: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.flags.len()
    }

    /// Slot holding row `i`, or the first free slot of its chain
    #[inline]
    fn probe(&self, i: usize) -> Option<usize> {
        let size = self.flags.len();
        if size == 0 {
            return None;
        }
        let mut slot = hash_of(i, size);
        for _ in 0..size {
            if self.flags[slot] < self.mark || self.keys[slot] == i {
                return Some(slot);
            }
            slot = (slot + 1) & (size - 1);
        }
        None
    }

    /// Rows present in the current vector, in slot order
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        let mark = self.mark;
        self.flags
            .iter()
            .zip(self.keys.iter())
            .filter(move |(&f, _)| f > mark)
            .map(|(_, &i)| i)
    }

    fn claim(&mut self, i: usize, mode: MaskMode) -> (Insert, usize) {
        let Some(slot) = self.probe(i) else {
            self.overflow = true;
            return (Insert::Blocked, 0);
        };
        let state = slot_state(self.flags[slot], self.mark);
        if state == SlotState::Present {
            return (Insert::Existing, slot);
        }
        if !allowed(state, mode) {
            return (Insert::Blocked, slot);
        }
        self.flags[slot] = self.mark + 1;
        self.keys[slot] = i;
        self.count += 1;
        (Insert::New, slot)
    }
}

impl<T: Scalar> Accumulator<T> for HashTable<'_, T> {
    fn next_vector(&mut self) {
        self.mark += 2;
        self.count = 0;
    }

    fn scatter_mask(&mut self, i: usize) {
        match self.probe(i) {
            Some(slot) => {
                if self.flags[slot] < self.mark {
                    self.flags[slot] = self.mark;
                    self.keys[slot] = i;
                }
            }
            None => self.overflow = true,
        }
    }

    #[inline]
    fn mark(&mut self, i: usize, mode: MaskMode) -> Insert {
        self.claim(i, mode).0
    }

    #[inline]
    fn upsert<A: AddOp<T>, F: FnOnce() -> T>(
        &mut self,
        i: usize,
        mode: MaskMode,
        add: &A,
        t: F,
    ) -> Insert {
        let (outcome, slot) = self.claim(i, mode);
        if self.values.is_empty() {
            return outcome;
        }
        match outcome {
            Insert::New => self.values[slot] = t(),
            Insert::Existing if !A::IS_ANY => {
                let cij = self.values[slot];
                if !add.is_terminal(cij) {
                    self.values[slot] = add.add(cij, t());
                }
            }
            _ => {}
        }
        outcome
    }

    fn value_at(&self, i: usize) -> T {
        match self.probe(i) {
            Some(slot) if self.flags[slot] > self.mark => {
                self.values.get(slot).copied().unwrap_or_default()
            }
            _ => T::default(),
        }
    }

    fn present(&self) -> usize {
        self.count
    }

    fn for_each_present(&self, mut f: impl FnMut(usize, T)) {
        for slot in 0..self.flags.len() {
            if self.flags[slot] > self.mark {
                f(
                    self.keys[slot],
                    self.values.get(slot).copied().unwrap_or_default(),
                );
            }
        }
    }

    fn overflowed(&self) -> bool {
        self.overflow
    }
}
