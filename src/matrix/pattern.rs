//! Sparsity structure of a matrix, independent of its values
//!
//! A matrix is held by column: it has `vdim` vectors of length `vlen`.
//! The four layouts share this shape:
//!
//! - full: every entry present, indices implicit
//! - bitmap: a presence flag per position alongside dense values
//! - sparse: per-vector offsets `p` and explicit indices `i`
//! - hypersparse: sparse plus the list `h` of non-empty vector indices
//!
//! Entry slots are numbered the same way the value array is: for full and
//! bitmap layouts slot `j*vlen + i` holds `(i, j)`; for sparse and
//! hypersparse the slot is the position in `i`.
//!
//! A zombie is an entry kept in a sparse or hypersparse vector with its
//! index bit-flipped. It reads as a negative `isize` and is skipped by
//! every consumer until [`crate::Matrix::wait`] removes it.

use std::ops::Range;

use crate::error::{AxbError, Result};

/// Sparsity representation of a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sparsity {
    Hypersparse,
    Sparse,
    Bitmap,
    Full,
}

/// Storage arrays of the four layouts
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Full,
    Bitmap { b: Vec<bool>, nvals: usize },
    Sparse { p: Vec<usize>, i: Vec<usize> },
    Hypersparse { p: Vec<usize>, h: Vec<usize>, i: Vec<usize> },
}

/// Flip an index to mark the entry as a zombie
#[inline]
pub const fn flip_index(i: usize) -> usize {
    !i
}

/// True if a stored index denotes a zombie
#[inline]
pub const fn is_zombie(i: usize) -> bool {
    (i as isize) < 0
}

/// The true index of a possibly flipped entry
#[inline]
pub const fn unflip_index(i: usize) -> usize {
    if is_zombie(i) {
        !i
    } else {
        i
    }
}

/// Shape and pattern of a matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub(crate) vlen: usize,
    pub(crate) vdim: usize,
    pub(crate) layout: Layout,
    /// Indices within some vector may be out of order
    pub(crate) jumbled: bool,
    pub(crate) nzombies: usize,
}

impl Structure {
    pub fn full(vlen: usize, vdim: usize) -> Self {
        Self {
            vlen,
            vdim,
            layout: Layout::Full,
            jumbled: false,
            nzombies: 0,
        }
    }

    /// A sparse structure with no entries
    pub fn empty(vlen: usize, vdim: usize) -> Self {
        Self {
            vlen,
            vdim,
            layout: Layout::Sparse {
                p: vec![0; vdim + 1],
                i: Vec::new(),
            },
            jumbled: false,
            nzombies: 0,
        }
    }

    /// Build and validate a structure
    pub fn new(vlen: usize, vdim: usize, layout: Layout, jumbled: bool) -> Result<Self> {
        let nzombies = match &layout {
            Layout::Sparse { i, .. } | Layout::Hypersparse { i, .. } => {
                i.iter().filter(|&&r| is_zombie(r)).count()
            }
            _ => 0,
        };
        let s = Self {
            vlen,
            vdim,
            layout,
            jumbled,
            nzombies,
        };
        s.validate()?;
        Ok(s)
    }

    pub(crate) fn from_parts_unchecked(
        vlen: usize,
        vdim: usize,
        layout: Layout,
        jumbled: bool,
        nzombies: usize,
    ) -> Self {
        Self {
            vlen,
            vdim,
            layout,
            jumbled,
            nzombies,
        }
    }

    #[inline]
    pub fn vlen(&self) -> usize {
        self.vlen
    }

    #[inline]
    pub fn vdim(&self) -> usize {
        self.vdim
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_jumbled(&self) -> bool {
        self.jumbled
    }

    pub fn nzombies(&self) -> usize {
        self.nzombies
    }

    pub fn sparsity(&self) -> Sparsity {
        match self.layout {
            Layout::Full => Sparsity::Full,
            Layout::Bitmap { .. } => Sparsity::Bitmap,
            Layout::Sparse { .. } => Sparsity::Sparse,
            Layout::Hypersparse { .. } => Sparsity::Hypersparse,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self.layout, Layout::Full)
    }

    #[inline]
    pub fn is_bitmap(&self) -> bool {
        matches!(self.layout, Layout::Bitmap { .. })
    }

    #[inline]
    pub fn is_hyper(&self) -> bool {
        matches!(self.layout, Layout::Hypersparse { .. })
    }

    #[inline]
    pub fn is_sparse_or_hyper(&self) -> bool {
        matches!(self.layout, Layout::Sparse { .. } | Layout::Hypersparse { .. })
    }

    #[inline]
    pub fn is_bitmap_or_full(&self) -> bool {
        !self.is_sparse_or_hyper()
    }

    /// Offsets of a sparse or hypersparse structure
    #[inline]
    pub fn p(&self) -> Option<&[usize]> {
        match &self.layout {
            Layout::Sparse { p, .. } | Layout::Hypersparse { p, .. } => Some(p),
            _ => None,
        }
    }

    /// Hyperlist of a hypersparse structure
    #[inline]
    pub fn h(&self) -> Option<&[usize]> {
        match &self.layout {
            Layout::Hypersparse { h, .. } => Some(h),
            _ => None,
        }
    }

    /// Stored indices of a sparse or hypersparse structure
    #[inline]
    pub fn i(&self) -> Option<&[usize]> {
        match &self.layout {
            Layout::Sparse { i, .. } | Layout::Hypersparse { i, .. } => Some(i),
            _ => None,
        }
    }

    /// Presence flags of a bitmap structure
    #[inline]
    pub fn b(&self) -> Option<&[bool]> {
        match &self.layout {
            Layout::Bitmap { b, .. } => Some(b),
            _ => None,
        }
    }

    /// Number of vectors held: `vdim`, or the hyperlist length
    #[inline]
    pub fn nvec(&self) -> usize {
        match &self.layout {
            Layout::Hypersparse { h, .. } => h.len(),
            _ => self.vdim,
        }
    }

    /// Number of entry slots, including zombies and absent bitmap positions
    pub fn nnz_held(&self) -> usize {
        match &self.layout {
            Layout::Full | Layout::Bitmap { .. } => self.vlen * self.vdim,
            Layout::Sparse { p, .. } | Layout::Hypersparse { p, .. } => {
                p.last().copied().unwrap_or(0)
            }
        }
    }

    /// Number of live entries
    pub fn nvals(&self) -> usize {
        match &self.layout {
            Layout::Full => self.vlen * self.vdim,
            Layout::Bitmap { nvals, .. } => *nvals,
            _ => self.nnz_held() - self.nzombies,
        }
    }

    /// True if every position holds a live entry
    pub fn is_as_if_full(&self) -> bool {
        match &self.layout {
            Layout::Full => true,
            Layout::Bitmap { nvals, .. } => *nvals == self.vlen * self.vdim,
            Layout::Sparse { .. } => {
                self.nzombies == 0 && self.nnz_held() == self.vlen * self.vdim
            }
            Layout::Hypersparse { h, .. } => {
                h.len() == self.vdim
                    && self.nzombies == 0
                    && self.nnz_held() == self.vlen * self.vdim
            }
        }
    }

    /// Index `j` of the `k`-th held vector
    #[inline]
    pub fn vector_index(&self, k: usize) -> usize {
        match &self.layout {
            Layout::Hypersparse { h, .. } => h[k],
            _ => k,
        }
    }

    /// Slot range of the `k`-th held vector
    #[inline]
    pub fn vector_range(&self, k: usize) -> Range<usize> {
        match &self.layout {
            Layout::Sparse { p, .. } | Layout::Hypersparse { p, .. } => p[k]..p[k + 1],
            _ => k * self.vlen..(k + 1) * self.vlen,
        }
    }

    /// Slot count of the `k`-th held vector
    #[inline]
    pub fn vector_len(&self, k: usize) -> usize {
        let r = self.vector_range(k);
        r.end - r.start
    }

    /// Position `k` of vector `j` among the held vectors
    #[inline]
    pub fn find_vector(&self, j: usize) -> Option<usize> {
        match &self.layout {
            Layout::Hypersparse { h, .. } => h.binary_search(&j).ok(),
            _ if j < self.vdim => Some(j),
            _ => None,
        }
    }

    /// Slot range of vector `j`; empty if the vector is not held
    #[inline]
    pub fn range_of(&self, j: usize) -> Range<usize> {
        match self.find_vector(j) {
            Some(k) => self.vector_range(k),
            None => 0..0,
        }
    }

    /// Stored index at slot `p`, flipped for zombies
    #[inline]
    pub fn index(&self, p: usize) -> usize {
        match &self.layout {
            Layout::Sparse { i, .. } | Layout::Hypersparse { i, .. } => i[p],
            _ => p % self.vlen.max(1),
        }
    }

    /// True if slot `p` holds a live entry
    #[inline]
    pub fn is_live(&self, p: usize) -> bool {
        match &self.layout {
            Layout::Full => true,
            Layout::Bitmap { b, .. } => b[p],
            Layout::Sparse { i, .. } | Layout::Hypersparse { i, .. } => !is_zombie(i[p]),
        }
    }

    /// Number of held vectors with at least one slot
    pub fn nvec_nonempty(&self) -> usize {
        match &self.layout {
            Layout::Full => {
                if self.vlen == 0 {
                    0
                } else {
                    self.vdim
                }
            }
            Layout::Bitmap { b, .. } => {
                if self.vlen == 0 {
                    return 0;
                }
                b.chunks(self.vlen)
                    .filter(|col| col.iter().any(|&x| x))
                    .count()
            }
            Layout::Sparse { p, .. } | Layout::Hypersparse { p, .. } => {
                p.windows(2).filter(|w| w[1] > w[0]).count()
            }
        }
    }

    /// Check every structural invariant
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(AxbError::InvalidObject(msg));
        match &self.layout {
            Layout::Full => Ok(()),
            Layout::Bitmap { b, nvals } => {
                if b.len() != self.vlen * self.vdim {
                    return bad(format!(
                        "bitmap has {} flags for a {}x{} matrix",
                        b.len(),
                        self.vlen,
                        self.vdim
                    ));
                }
                let count = b.iter().filter(|&&x| x).count();
                if count != *nvals {
                    return bad(format!("bitmap holds {} entries, header says {}", count, nvals));
                }
                Ok(())
            }
            Layout::Sparse { p, i } | Layout::Hypersparse { p, i, .. } => {
                let nvec = self.nvec();
                if p.len() != nvec + 1 {
                    return bad(format!("offsets have length {}, expected {}", p.len(), nvec + 1));
                }
                if p[0] != 0 || p[nvec] != i.len() {
                    return bad(format!(
                        "offsets must run from 0 to {}, got {}..{}",
                        i.len(),
                        p[0],
                        p[nvec]
                    ));
                }
                if p.windows(2).any(|w| w[1] < w[0]) {
                    return bad("offsets must be non-decreasing".to_string());
                }
                if let Layout::Hypersparse { h, .. } = &self.layout {
                    if h.windows(2).any(|w| w[1] <= w[0]) {
                        return bad("hyperlist must be strictly increasing".to_string());
                    }
                    if h.last().is_some_and(|&j| j >= self.vdim) {
                        return bad("hyperlist entry out of range".to_string());
                    }
                }
                let mut zombies = 0;
                let mut rows = Vec::new();
                for k in 0..nvec {
                    let v = &i[p[k]..p[k + 1]];
                    zombies += v.iter().filter(|&&r| is_zombie(r)).count();
                    rows.clear();
                    rows.extend(v.iter().map(|&r| unflip_index(r)));
                    if let Some(&r) = rows.iter().find(|&&r| r >= self.vlen) {
                        return bad(format!("index {} out of range in vector {}", r, k));
                    }
                    if !self.jumbled && rows.windows(2).any(|w| w[0] > w[1]) {
                        return bad(format!("vector {} is unsorted but not jumbled", k));
                    }
                    rows.sort_unstable();
                    if rows.windows(2).any(|w| w[0] == w[1]) {
                        return bad(format!("duplicate index in vector {}", k));
                    }
                }
                if zombies != self.nzombies {
                    return bad(format!(
                        "found {} zombies, header says {}",
                        zombies, self.nzombies
                    ));
                }
                Ok(())
            }
        }
    }
}
