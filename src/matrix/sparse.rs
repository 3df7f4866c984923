//! Typed matrix: a [`Structure`] plus its values
//!
//! Values are stored per slot in the same order as the structure's slots.
//! An iso matrix stores a single value shared by every entry.

use std::fmt;

use crate::constants::{MAX_DISPLAY_ELEMENTS_PER_VECTOR, MAX_DISPLAY_VECTORS};
use crate::error::{AxbError, Result};
use crate::matrix::pattern::{unflip_index, Layout, Sparsity, Structure};
use crate::semiring::Scalar;

/// A matrix in any of the four sparsity layouts
#[derive(Clone)]
pub struct Matrix<T> {
    pub(crate) s: Structure,
    pub(crate) x: Vec<T>,
    pub(crate) iso: bool,
}

impl<T: Scalar> Matrix<T> {
    /// Combine a structure with its values.
    ///
    /// # Arguments
    /// * `s` - A validated structure
    /// * `x` - One value per slot, or exactly one value if `iso`
    /// * `iso` - True if all entries share `x[0]`
    pub fn from_parts(s: Structure, x: Vec<T>, iso: bool) -> Result<Self> {
        let expected = if iso { 1 } else { s.nnz_held() };
        if x.len() != expected {
            return Err(AxbError::InvalidObject(format!(
                "{} values for {} slots{}",
                x.len(),
                expected,
                if iso { " (iso)" } else { "" }
            )));
        }
        Ok(Self { s, x, iso })
    }

    pub(crate) fn from_parts_unchecked(s: Structure, x: Vec<T>, iso: bool) -> Self {
        debug_assert_eq!(x.len(), if iso { 1 } else { s.nnz_held() });
        Self { s, x, iso }
    }

    /// Sparse matrix from column offsets, row indices and values
    pub fn sparse(
        nrows: usize,
        ncols: usize,
        p: Vec<usize>,
        i: Vec<usize>,
        x: Vec<T>,
    ) -> Result<Self> {
        let s = Structure::new(nrows, ncols, Layout::Sparse { p, i }, false)?;
        Self::from_parts(s, x, false)
    }

    /// Sparse matrix whose columns may be unsorted
    pub fn sparse_jumbled(
        nrows: usize,
        ncols: usize,
        p: Vec<usize>,
        i: Vec<usize>,
        x: Vec<T>,
    ) -> Result<Self> {
        let s = Structure::new(nrows, ncols, Layout::Sparse { p, i }, true)?;
        Self::from_parts(s, x, false)
    }

    /// Hypersparse matrix: only the columns listed in `h` are held
    pub fn hypersparse(
        nrows: usize,
        ncols: usize,
        p: Vec<usize>,
        h: Vec<usize>,
        i: Vec<usize>,
        x: Vec<T>,
    ) -> Result<Self> {
        let s = Structure::new(nrows, ncols, Layout::Hypersparse { p, h, i }, false)?;
        Self::from_parts(s, x, false)
    }

    /// Bitmap matrix from column-major presence flags and values
    pub fn bitmap(nrows: usize, ncols: usize, b: Vec<bool>, x: Vec<T>) -> Result<Self> {
        let nvals = b.iter().filter(|&&v| v).count();
        let s = Structure::new(nrows, ncols, Layout::Bitmap { b, nvals }, false)?;
        Self::from_parts(s, x, false)
    }

    /// Full matrix from column-major values
    pub fn full(nrows: usize, ncols: usize, x: Vec<T>) -> Result<Self> {
        Self::from_parts(Structure::full(nrows, ncols), x, false)
    }

    /// Full matrix with every entry equal to `value`
    pub fn iso_full(nrows: usize, ncols: usize, value: T) -> Self {
        Self::from_parts_unchecked(Structure::full(nrows, ncols), vec![value], true)
    }

    /// Sparse matrix with the given pattern and every entry equal to `value`
    pub fn iso_sparse(
        nrows: usize,
        ncols: usize,
        p: Vec<usize>,
        i: Vec<usize>,
        value: T,
    ) -> Result<Self> {
        let s = Structure::new(nrows, ncols, Layout::Sparse { p, i }, false)?;
        Self::from_parts(s, vec![value], true)
    }

    /// Sparse matrix with no entries
    pub fn empty(nrows: usize, ncols: usize) -> Self {
        Self::from_parts_unchecked(Structure::empty(nrows, ncols), Vec::new(), false)
    }

    /// Square sparse matrix with `values` on its diagonal
    pub fn diagonal(values: &[T]) -> Self {
        let n = values.len();
        let s = Structure::from_parts_unchecked(
            n,
            n,
            Layout::Sparse {
                p: (0..=n).collect(),
                i: (0..n).collect(),
            },
            false,
            0,
        );
        Self::from_parts_unchecked(s, values.to_vec(), false)
    }

    /// Sparse matrix from `(row, col, value)` triplets in any order.
    ///
    /// Duplicate positions are rejected.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Result<Self> {
        let mut sorted: Vec<(usize, usize, T)> = triplets.to_vec();
        sorted.sort_by_key(|&(i, j, _)| (j, i));
        if let Some(w) = sorted
            .windows(2)
            .find(|w| (w[0].0, w[0].1) == (w[1].0, w[1].1))
        {
            return Err(AxbError::InvalidValue(format!(
                "duplicate entry ({}, {})",
                w[0].0, w[0].1
            )));
        }
        if let Some(&(i, j, _)) = sorted.iter().find(|&&(i, j, _)| i >= nrows || j >= ncols) {
            return Err(AxbError::DimensionMismatch(format!(
                "entry ({}, {}) outside a {}x{} matrix",
                i, j, nrows, ncols
            )));
        }
        let mut p = vec![0usize; ncols + 1];
        for &(_, j, _) in &sorted {
            p[j + 1] += 1;
        }
        for j in 0..ncols {
            p[j + 1] += p[j];
        }
        let i = sorted.iter().map(|&(i, _, _)| i).collect();
        let x = sorted.iter().map(|&(_, _, v)| v).collect();
        Self::sparse(nrows, ncols, p, i, x)
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.s.vlen
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.s.vdim
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.s.vlen, self.s.vdim)
    }

    pub fn structure(&self) -> &Structure {
        &self.s
    }

    pub fn sparsity(&self) -> Sparsity {
        self.s.sparsity()
    }

    pub fn is_iso(&self) -> bool {
        self.iso
    }

    pub fn iso_value(&self) -> Option<T> {
        if self.iso {
            self.x.first().copied()
        } else {
            None
        }
    }

    /// Raw value array (one value if iso)
    pub fn values(&self) -> &[T] {
        &self.x
    }

    /// Number of live entries
    pub fn nvals(&self) -> usize {
        self.s.nvals()
    }

    pub fn is_jumbled(&self) -> bool {
        self.s.jumbled
    }

    pub fn nzombies(&self) -> usize {
        self.s.nzombies
    }

    /// Value at slot `p`
    #[inline]
    pub(crate) fn value(&self, p: usize) -> T {
        if self.iso {
            self.x[0]
        } else {
            self.x[p]
        }
    }

    /// Value of entry `(i, j)`, or None if it is not present
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i >= self.s.vlen || j >= self.s.vdim {
            return None;
        }
        let p = match &self.s.layout {
            Layout::Full | Layout::Bitmap { .. } => j * self.s.vlen + i,
            Layout::Sparse { .. } | Layout::Hypersparse { .. } => {
                let range = self.s.range_of(j);
                let rows = &self.s.i().unwrap_or(&[])[range.clone()];
                let offset = if self.s.jumbled {
                    rows.iter().position(|&r| r == i)?
                } else {
                    // zombies keep their sorted position under the flip
                    rows.binary_search_by_key(&i, |&r| unflip_index(r)).ok()?
                };
                range.start + offset
            }
        };
        if self.s.is_live(p) {
            Some(self.value(p))
        } else {
            None
        }
    }

    /// All live entries as `(row, col, value)`, column by column.
    ///
    /// Rows come out in storage order; they are sorted unless the matrix
    /// is jumbled.
    pub fn entries(&self) -> Vec<(usize, usize, T)> {
        let mut out = Vec::with_capacity(self.s.nvals());
        for k in 0..self.s.nvec() {
            let j = self.s.vector_index(k);
            for p in self.s.vector_range(k) {
                if self.s.is_live(p) {
                    out.push((self.s.index(p), j, self.value(p)));
                }
            }
        }
        out
    }

    /// Entries sorted by `(col, row)` regardless of jumbling
    pub fn sorted_entries(&self) -> Vec<(usize, usize, T)> {
        let mut out = self.entries();
        out.sort_by_key(|&(i, j, _)| (j, i));
        out
    }

    /// Expand the iso value into a full value array
    pub fn expand_iso(&mut self) {
        if self.iso {
            let v = self.x.first().copied().unwrap_or_default();
            self.x = vec![v; self.s.nnz_held()];
            self.iso = false;
        }
    }
}

impl<T: Scalar> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {{")?;
        writeln!(f, "  dimensions: {} × {}", self.s.vlen, self.s.vdim)?;
        writeln!(f, "  sparsity: {:?}", self.s.sparsity())?;
        writeln!(f, "  nvals: {}", self.s.nvals())?;
        if self.iso {
            writeln!(f, "  iso value: {:?}", self.x.first())?;
        }
        if self.s.jumbled || self.s.nzombies > 0 {
            writeln!(f, "  jumbled: {}, zombies: {}", self.s.jumbled, self.s.nzombies)?;
        }

        // Print a sample of the matrix content
        let nvec = self.s.nvec();
        let max_vectors = MAX_DISPLAY_VECTORS.min(nvec);

        if max_vectors > 0 {
            writeln!(f, "  content sample:")?;

            for k in 0..max_vectors {
                write!(f, "    col {}: ", self.s.vector_index(k))?;
                let live: Vec<usize> = self
                    .s
                    .vector_range(k)
                    .filter(|&p| self.s.is_live(p))
                    .collect();

                if live.is_empty() {
                    writeln!(f, "(empty)")?;
                } else {
                    let max_elements = MAX_DISPLAY_ELEMENTS_PER_VECTOR.min(live.len());

                    for &p in &live[..max_elements] {
                        write!(f, "({}, {:?}) ", self.s.index(p), self.value(p))?;
                    }

                    if live.len() > max_elements {
                        write!(f, "... ({} more)", live.len() - max_elements)?;
                    }

                    writeln!(f)?;
                }
            }

            if nvec > max_vectors {
                writeln!(f, "    ... ({} more columns)", nvec - max_vectors)?;
            }
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sparse_matrix() {
        let m = Matrix::sparse(3, 3, vec![0, 2, 4, 5], vec![0, 2, 0, 1, 2], vec![1, 4, 2, 3, 5])
            .unwrap();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.nvals(), 5);
        assert_eq!(m.get(2, 0), Some(4));
        assert_eq!(m.get(1, 0), None);
        assert_eq!(m.get(2, 2), Some(5));
    }

    #[test]
    fn test_value_count_is_checked() {
        let m = Matrix::sparse(3, 1, vec![0, 2], vec![0, 2], vec![1.0]);
        assert!(matches!(m, Err(AxbError::InvalidObject(_))));
    }

    #[test]
    fn test_from_triplets_sorts_and_rejects_duplicates() {
        let m = Matrix::from_triplets(3, 2, &[(2, 1, 7), (0, 0, 1), (1, 1, 5)]).unwrap();
        assert_eq!(m.entries(), vec![(0, 0, 1), (1, 1, 5), (2, 1, 7)]);

        let dup = Matrix::from_triplets(3, 2, &[(1, 1, 7), (1, 1, 5)]);
        assert!(matches!(dup, Err(AxbError::InvalidValue(_))));

        let out = Matrix::from_triplets(3, 2, &[(3, 1, 7)]);
        assert!(matches!(out, Err(AxbError::DimensionMismatch(_))));
    }

    #[test]
    fn test_iso_full() {
        let m = Matrix::iso_full(4, 4, 2.0f64);
        assert!(m.is_iso());
        assert_eq!(m.values().len(), 1);
        assert_eq!(m.nvals(), 16);
        assert_eq!(m.get(3, 1), Some(2.0));
    }

    #[test]
    fn test_diagonal() {
        let d = Matrix::diagonal(&[2, 3, 4]);
        assert_eq!(d.entries(), vec![(0, 0, 2), (1, 1, 3), (2, 2, 4)]);
    }

    #[test]
    fn test_hypersparse_get() {
        let m = Matrix::hypersparse(4, 10, vec![0, 1, 3], vec![0, 3], vec![2, 0, 3], vec![1, 2, 3])
            .unwrap();
        assert_eq!(m.get(0, 3), Some(2));
        assert_eq!(m.get(0, 5), None);
        assert_eq!(m.nvals(), 3);
    }

    #[test]
    fn test_bitmap_get() {
        let m = Matrix::bitmap(2, 2, vec![true, false, false, true], vec![1, 0, 0, 4]).unwrap();
        assert_eq!(m.get(0, 0), Some(1));
        assert_eq!(m.get(1, 0), None);
        assert_eq!(m.get(1, 1), Some(4));
    }

    #[test]
    fn test_debug_output() {
        let m = Matrix::<i32>::diagonal(&[1, 2]);
        let text = format!("{:?}", m);
        assert!(text.contains("dimensions: 2 × 2"));
        assert!(text.contains("col 1: (1, 2)"));
    }
}
