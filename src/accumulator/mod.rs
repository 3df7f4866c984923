//! Scratch accumulators for the saxpy engines
//!
//! Every output vector of a saxpy task is accumulated in a scratch table
//! indexed by row. Two kinds exist: a Gustavson table with one slot per
//! row, and an open-addressing hash table sized from the task's flop
//! estimate. Both reset in O(1) between vectors with a generation mark:
//! a slot whose flag is below `mark` is empty, `flag == mark` means the
//! mask holds the row, and `flag == mark + 1` means the row is present.
//!
//! All tables of one call are carved from a single [`ScratchArena`],
//! allocated before the parallel region.

pub mod gustavson;
pub mod hash;
pub mod sort;

use aligned_vec::AVec;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::{AxbError, Result};
use crate::semiring::{AddOp, Scalar};

pub use gustavson::GustavsonTable;
pub use hash::HashTable;

/// Kind of scratch table used by one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Gustavson,
    Hash,
}

/// Kind and slot count of one scratch table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub kind: TableKind,
    pub size: usize,
}

/// How the mask scattered into a table is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    /// No mask: every row may be written
    Unmasked,
    /// Only rows scattered from the mask may be written
    Mask,
    /// Rows scattered from the mask may not be written
    Complement,
}

/// Outcome of offering a row to a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// The mask forbids the row
    Blocked,
    /// First contribution to the row in this vector
    New,
    /// The row was already present
    Existing,
}

/// State of one row in the current vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Empty,
    Masked,
    Present,
}

#[inline]
pub(crate) fn slot_state(flag: u64, mark: u64) -> SlotState {
    if flag < mark {
        SlotState::Empty
    } else if flag == mark {
        SlotState::Masked
    } else {
        SlotState::Present
    }
}

#[inline]
pub(crate) fn allowed(state: SlotState, mode: MaskMode) -> bool {
    match mode {
        MaskMode::Unmasked => true,
        MaskMode::Mask => state != SlotState::Empty,
        MaskMode::Complement => state != SlotState::Masked,
    }
}

/// A scratch table accumulating one output vector at a time
pub trait Accumulator<T: Scalar> {
    /// Start a new output vector; previous contents become stale
    fn next_vector(&mut self);

    /// Record that the mask holds row `i` in the current vector
    fn scatter_mask(&mut self, i: usize);

    /// Symbolic insert: mark row `i` present without touching values
    fn mark(&mut self, i: usize, mode: MaskMode) -> Insert;

    /// Numeric insert: add `t()` to row `i`; `t` runs only if the value is
    /// needed
    fn upsert<A: AddOp<T>, F: FnOnce() -> T>(
        &mut self,
        i: usize,
        mode: MaskMode,
        add: &A,
        t: F,
    ) -> Insert;

    /// Value accumulated for a present row
    fn value_at(&self, i: usize) -> T;

    /// Number of rows present in the current vector
    fn present(&self) -> usize;

    /// Call `f(i, value)` for every present row, in table order
    fn for_each_present(&self, f: impl FnMut(usize, T));

    /// True if an insert found no free slot
    fn overflowed(&self) -> bool {
        false
    }
}

/// One carved table of either kind
pub enum TableView<'a, T> {
    Gustavson(GustavsonTable<'a, T>),
    Hash(HashTable<'a, T>),
}

impl<T: Scalar> TableView<'_, T> {
    pub fn kind(&self) -> TableKind {
        match self {
            TableView::Gustavson(_) => TableKind::Gustavson,
            TableView::Hash(_) => TableKind::Hash,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $t:ident => $e:expr) => {
        match $self {
            TableView::Gustavson($t) => $e,
            TableView::Hash($t) => $e,
        }
    };
}

impl<T: Scalar> Accumulator<T> for TableView<'_, T> {
    fn next_vector(&mut self) {
        delegate!(self, t => t.next_vector())
    }

    fn scatter_mask(&mut self, i: usize) {
        delegate!(self, t => t.scatter_mask(i))
    }

    fn mark(&mut self, i: usize, mode: MaskMode) -> Insert {
        delegate!(self, t => t.mark(i, mode))
    }

    fn upsert<A: AddOp<T>, F: FnOnce() -> T>(
        &mut self,
        i: usize,
        mode: MaskMode,
        add: &A,
        t: F,
    ) -> Insert {
        delegate!(self, table => table.upsert(i, mode, add, t))
    }

    fn value_at(&self, i: usize) -> T {
        delegate!(self, t => t.value_at(i))
    }

    fn present(&self) -> usize {
        delegate!(self, t => t.present())
    }

    fn for_each_present(&self, f: impl FnMut(usize, T)) {
        delegate!(self, t => t.for_each_present(f))
    }

    fn overflowed(&self) -> bool {
        delegate!(self, t => t.overflowed())
    }
}

struct Region {
    spec: TableSpec,
    padded: usize,
}

/// Per-call storage for every scratch table of a plan.
///
/// Regions are padded to cache-line multiples so neighbouring tasks never
/// share a line.
pub struct ScratchArena<T> {
    flags: AVec<u64>,
    keys: AVec<usize>,
    values: AVec<T>,
    regions: Vec<Region>,
    with_values: bool,
}

fn padded_len(size: usize, elem_bytes: usize, line: usize) -> usize {
    let per_line = (line / elem_bytes.max(1)).max(1);
    size.div_ceil(per_line) * per_line
}

impl<T: Scalar> ScratchArena<T> {
    /// Allocate all tables of a plan.
    ///
    /// # Arguments
    /// * `specs` - Kind and size of each table, in task order
    /// * `with_values` - False for pattern-only results
    /// * `cache_line` - Cache line size in bytes
    pub fn new(specs: &[TableSpec], with_values: bool, cache_line: usize) -> Result<Self> {
        let line = cache_line.max(8);
        let regions: Vec<Region> = specs
            .iter()
            .map(|&spec| Region {
                spec,
                padded: padded_len(spec.size, std::mem::size_of::<u64>(), line),
            })
            .collect();

        let total = regions
            .iter()
            .try_fold(0usize, |acc, r| acc.checked_add(r.padded))
            .ok_or(AxbError::OutOfMemory { size: usize::MAX })?;
        let hash_total: usize = regions
            .iter()
            .filter(|r| r.spec.kind == TableKind::Hash)
            .map(|r| r.padded)
            .sum();
        let value_total = if with_values { total } else { 0 };

        let bytes = total
            .saturating_mul(8)
            .saturating_add(hash_total.saturating_mul(std::mem::size_of::<usize>()))
            .saturating_add(value_total.saturating_mul(std::mem::size_of::<T>()));
        if bytes > isize::MAX as usize {
            return Err(AxbError::OutOfMemory { size: bytes });
        }
        log::trace!(
            "scratch arena: {} tables, {} slots, {} bytes",
            regions.len(),
            total,
            bytes
        );

        Ok(Self {
            flags: AVec::from_iter(line, std::iter::repeat(0u64).take(total)),
            keys: AVec::from_iter(line, std::iter::repeat(0usize).take(hash_total)),
            values: AVec::from_iter(line, std::iter::repeat(T::default()).take(value_total)),
            regions,
            with_values,
        })
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Carve the arena into one table per spec, in order
    pub fn tables(&mut self) -> Vec<TableView<'_, T>> {
        let mut flags: &mut [u64] = &mut self.flags;
        let mut keys: &mut [usize] = &mut self.keys;
        let mut values: &mut [T] = &mut self.values;
        let mut out = Vec::with_capacity(self.regions.len());

        for r in &self.regions {
            let (f, rest) = std::mem::take(&mut flags).split_at_mut(r.padded);
            flags = rest;
            let v = if self.with_values {
                let (v, rest) = std::mem::take(&mut values).split_at_mut(r.padded);
                values = rest;
                &mut v[..r.spec.size]
            } else {
                &mut []
            };
            let f = &mut f[..r.spec.size];
            match r.spec.kind {
                TableKind::Gustavson => out.push(TableView::Gustavson(GustavsonTable::new(f, v))),
                TableKind::Hash => {
                    let (k, rest) = std::mem::take(&mut keys).split_at_mut(r.padded);
                    keys = rest;
                    out.push(TableView::Hash(HashTable::new(f, &mut k[..r.spec.size], v)));
                }
            }
        }
        out
    }
}

/// Fine tasks sharing one scratch table for a single output vector.
///
/// Members run in parallel; each computes its contributions privately and
/// merges them into the shared table under the team lock. Returning from
/// [`TaskGroup::run`] is the barrier after which the table holds the
/// whole vector.
pub struct TaskGroup<'t, 'a, T> {
    table: Mutex<&'t mut TableView<'a, T>>,
    members: usize,
}

impl<'t, 'a, T: Scalar> TaskGroup<'t, 'a, T> {
    pub fn new(table: &'t mut TableView<'a, T>, members: usize) -> Self {
        Self {
            table: Mutex::new(table),
            members,
        }
    }

    /// Run `body(member, &lock)` for every member and wait for all of them
    pub fn run<F>(&self, body: F)
    where
        F: Fn(usize, &Mutex<&'t mut TableView<'a, T>>) + Sync + Send,
    {
        (0..self.members)
            .into_par_iter()
            .for_each(|member| body(member, &self.table));
    }

    /// Exclusive access to the table once the members are done
    pub fn with_table<R>(&self, f: impl FnOnce(&mut TableView<'a, T>) -> R) -> R {
        let mut guard = self.table.lock();
        f(&mut guard)
    }
}
