//! Write masks
//!
//! A mask selects which positions of `C` a multiply may write. It borrows
//! the structure of a matrix of any element type; a valued mask also keeps
//! one boolean per slot (true where the value is nonzero), a structural
//! mask only looks at which entries are present.

use crate::matrix::pattern::{unflip_index, Layout, Structure};
use crate::matrix::Matrix;
use crate::semiring::Scalar;

#[derive(Debug, Clone)]
enum MaskValues {
    Structural,
    Iso(bool),
    Values(Vec<bool>),
}

/// Mask of a multiply, with its complement and structure-only flags
#[derive(Debug, Clone)]
pub struct Mask<'a> {
    s: &'a Structure,
    values: MaskValues,
    complement: bool,
}

impl<'a> Mask<'a> {
    /// Valued mask: `M(i,j)` is true where the entry is present and nonzero
    pub fn new<M: Scalar>(m: &'a Matrix<M>) -> Self {
        let values = if m.is_iso() {
            MaskValues::Iso(m.values().first().is_some_and(|v| v.is_nonzero()))
        } else {
            MaskValues::Values(m.values().iter().map(|v| v.is_nonzero()).collect())
        };
        Self {
            s: m.structure(),
            values,
            complement: false,
        }
    }

    /// Structural mask: `M(i,j)` is true wherever an entry is present
    pub fn structural<M: Scalar>(m: &'a Matrix<M>) -> Self {
        Self {
            s: m.structure(),
            values: MaskValues::Structural,
            complement: false,
        }
    }

    /// Use `!M` instead of `M`
    pub fn complement(mut self) -> Self {
        self.complement = !self.complement;
        self
    }

    pub fn with_complement(mut self, complement: bool) -> Self {
        self.complement = complement;
        self
    }

    pub fn is_complemented(&self) -> bool {
        self.complement
    }

    /// True if only the pattern of M is consulted
    pub fn is_structural(&self) -> bool {
        match self.values {
            MaskValues::Structural => true,
            MaskValues::Iso(v) => v,
            MaskValues::Values(_) => false,
        }
    }

    pub fn structure(&self) -> &Structure {
        self.s
    }

    pub fn nrows(&self) -> usize {
        self.s.vlen
    }

    pub fn ncols(&self) -> usize {
        self.s.vdim
    }

    /// Number of present entries of M
    pub fn nvals(&self) -> usize {
        self.s.nvals()
    }

    /// Mask value at slot `q` of M, before complementing
    #[inline]
    pub(crate) fn test_slot(&self, q: usize) -> bool {
        self.s.is_live(q)
            && match &self.values {
                MaskValues::Structural => true,
                MaskValues::Iso(v) => *v,
                MaskValues::Values(v) => v[q],
            }
    }

    /// `M(i,j)` before complementing
    pub(crate) fn get(&self, i: usize, j: usize) -> bool {
        match &self.s.layout {
            Layout::Full | Layout::Bitmap { .. } => self.test_slot(j * self.s.vlen + i),
            Layout::Sparse { i: rows, .. } | Layout::Hypersparse { i: rows, .. } => {
                let range = self.s.range_of(j);
                let v = &rows[range.clone()];
                let found = if self.s.jumbled {
                    v.iter().position(|&r| unflip_index(r) == i)
                } else {
                    v.binary_search_by_key(&i, |&r| unflip_index(r)).ok()
                };
                found.is_some_and(|off| self.test_slot(range.start + off))
            }
        }
    }

    /// True if `C(i,j)` may be written
    #[inline]
    pub(crate) fn allows(&self, i: usize, j: usize) -> bool {
        self.get(i, j) != self.complement
    }

    /// Call `f(i)` for every `i` with `M(i,j)` true, before complementing
    pub(crate) fn for_each_true(&self, j: usize, mut f: impl FnMut(usize)) {
        let range = match &self.s.layout {
            Layout::Full | Layout::Bitmap { .. } => j * self.s.vlen..(j + 1) * self.s.vlen,
            _ => self.s.range_of(j),
        };
        for q in range {
            if self.test_slot(q) {
                f(self.s.index(q));
            }
        }
    }

    /// Slots held by vector `j` of M
    pub(crate) fn vector_work(&self, j: usize) -> usize {
        match &self.s.layout {
            Layout::Full | Layout::Bitmap { .. } => self.s.vlen,
            _ => self.s.range_of(j).len(),
        }
    }

    /// A structural mask that holds every position: `C<M>` is just `C`
    pub(crate) fn is_trivially_full(&self) -> bool {
        self.is_structural() && self.s.is_as_if_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valued_mask_skips_zeros() {
        let m = Matrix::from_triplets(3, 2, &[(0, 0, 1.0), (2, 0, 0.0), (1, 1, 2.0)]).unwrap();
        let mask = Mask::new(&m);
        assert!(mask.get(0, 0));
        assert!(!mask.get(2, 0));
        assert!(!mask.get(1, 0));
        assert!(mask.get(1, 1));
        assert!(!mask.is_structural());

        let s = Mask::structural(&m);
        assert!(s.get(2, 0));
    }

    #[test]
    fn test_complement() {
        let m = Matrix::from_triplets(2, 1, &[(0, 0, true)]).unwrap();
        let mask = Mask::new(&m).complement();
        assert!(!mask.allows(0, 0));
        assert!(mask.allows(1, 0));
    }

    #[test]
    fn test_for_each_true_on_bitmap() {
        let m = Matrix::bitmap(2, 2, vec![true, true, false, true], vec![1, 0, 0, 5]).unwrap();
        let mask = Mask::new(&m);
        let mut rows = Vec::new();
        mask.for_each_true(0, |i| rows.push(i));
        assert_eq!(rows, vec![0]);
        rows.clear();
        mask.for_each_true(1, |i| rows.push(i));
        assert_eq!(rows, vec![1]);
        assert_eq!(mask.vector_work(1), 2);
    }

    #[test]
    fn test_trivially_full() {
        let m = Matrix::iso_full(3, 3, 1i8);
        assert!(Mask::structural(&m).is_trivially_full());
        assert!(Mask::new(&m).is_trivially_full());
        let zero = Matrix::iso_full(3, 3, 0i8);
        assert!(!Mask::new(&zero).is_trivially_full());
    }
}
