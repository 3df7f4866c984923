//! Conversion between sparsity layouts, transposition, and finalization

use crate::accumulator::sort::sort_vectors;
use crate::constants::HYPER_SWITCH;
use crate::error::{AxbError, Result};
use crate::matrix::pattern::{is_zombie, Layout, Sparsity, Structure};
use crate::matrix::Matrix;
use crate::semiring::Scalar;

/// Live entries of a matrix in plain compressed-column form, every column
/// held, rows sorted, values omitted for iso matrices
struct Columns<T> {
    p: Vec<usize>,
    i: Vec<usize>,
    x: Vec<T>,
}

impl<T: Scalar> Matrix<T> {
    fn gather_columns(&self) -> Columns<T> {
        let n = self.s.vdim;
        let mut p = vec![0usize; n + 1];
        let mut i = Vec::with_capacity(self.s.nvals());
        let mut x = Vec::with_capacity(if self.iso { 0 } else { self.s.nvals() });
        let mut column: Vec<(usize, usize)> = Vec::new();

        for k in 0..self.s.nvec() {
            let j = self.s.vector_index(k);
            column.clear();
            column.extend(
                self.s
                    .vector_range(k)
                    .filter(|&q| self.s.is_live(q))
                    .map(|q| (self.s.index(q), q)),
            );
            if self.s.jumbled {
                column.sort_unstable_by_key(|&(r, _)| r);
            }
            for &(r, q) in &column {
                i.push(r);
                if !self.iso {
                    x.push(self.x[q]);
                }
            }
            p[j + 1] = i.len();
        }
        // columns that are not held end where the previous one did
        for j in 0..n {
            p[j + 1] = p[j + 1].max(p[j]);
        }
        Columns { p, i, x }
    }

    fn values_or_iso(&self, x: Vec<T>) -> Vec<T> {
        if self.iso {
            self.x.clone()
        } else {
            x
        }
    }

    /// Convert to the requested sparsity layout.
    ///
    /// The result has no zombies and no jumbled vectors. Converting to
    /// full fails unless every entry is present.
    pub fn convert(&self, target: Sparsity) -> Result<Self> {
        match target {
            Sparsity::Sparse => Ok(self.to_sparse()),
            Sparsity::Hypersparse => Ok(self.to_hypersparse()),
            Sparsity::Bitmap => Ok(self.to_bitmap()),
            Sparsity::Full => self.to_full(),
        }
    }

    pub fn to_sparse(&self) -> Self {
        let cols = self.gather_columns();
        let s = Structure::from_parts_unchecked(
            self.s.vlen,
            self.s.vdim,
            Layout::Sparse { p: cols.p, i: cols.i },
            false,
            0,
        );
        Self::from_parts_unchecked(s, self.values_or_iso(cols.x), self.iso)
    }

    pub fn to_hypersparse(&self) -> Self {
        let cols = self.gather_columns();
        let mut p = vec![0usize];
        let mut h = Vec::new();
        for j in 0..self.s.vdim {
            if cols.p[j + 1] > cols.p[j] {
                h.push(j);
                p.push(cols.p[j + 1]);
            }
        }
        let s = Structure::from_parts_unchecked(
            self.s.vlen,
            self.s.vdim,
            Layout::Hypersparse { p, h, i: cols.i },
            false,
            0,
        );
        Self::from_parts_unchecked(s, self.values_or_iso(cols.x), self.iso)
    }

    pub fn to_bitmap(&self) -> Self {
        let (m, n) = (self.s.vlen, self.s.vdim);
        let mut b = vec![false; m * n];
        let mut x = if self.iso {
            Vec::new()
        } else {
            vec![T::default(); m * n]
        };
        for k in 0..self.s.nvec() {
            let j = self.s.vector_index(k);
            for q in self.s.vector_range(k) {
                if self.s.is_live(q) {
                    let slot = j * m + self.s.index(q);
                    b[slot] = true;
                    if !self.iso {
                        x[slot] = self.x[q];
                    }
                }
            }
        }
        let nvals = self.s.nvals();
        let s = Structure::from_parts_unchecked(m, n, Layout::Bitmap { b, nvals }, false, 0);
        Self::from_parts_unchecked(s, self.values_or_iso(x), self.iso)
    }

    pub fn to_full(&self) -> Result<Self> {
        if !self.s.is_as_if_full() {
            return Err(AxbError::InvalidValue(format!(
                "a {}x{} matrix with {} entries cannot be full",
                self.s.vlen,
                self.s.vdim,
                self.s.nvals()
            )));
        }
        let bitmap = self.to_bitmap();
        let s = Structure::full(self.s.vlen, self.s.vdim);
        Ok(Self::from_parts_unchecked(s, bitmap.x, self.iso))
    }

    /// The transpose, in the same layout family.
    ///
    /// Full and bitmap inputs stay full and bitmap. Sparse inputs give a
    /// sparse result; hypersparse inputs give a hypersparse result when few
    /// of its vectors are non-empty.
    pub fn transpose(&self) -> Self {
        let (m, n) = (self.s.vlen, self.s.vdim);
        match &self.s.layout {
            Layout::Full | Layout::Bitmap { .. } => {
                let from = |q: usize| (q % n) * m + q / n;
                let x = if self.iso {
                    self.x.clone()
                } else {
                    (0..m * n).map(|q| self.x[from(q)]).collect()
                };
                let layout = match &self.s.layout {
                    Layout::Bitmap { b, nvals } => Layout::Bitmap {
                        b: (0..m * n).map(|q| b[from(q)]).collect(),
                        nvals: *nvals,
                    },
                    _ => Layout::Full,
                };
                let s = Structure::from_parts_unchecked(n, m, layout, false, 0);
                Self::from_parts_unchecked(s, x, self.iso)
            }
            Layout::Sparse { .. } | Layout::Hypersparse { .. } => {
                // counting sort on row indices; columns are visited in order
                // so every output vector comes out sorted
                let mut p = vec![0usize; m + 1];
                for q in 0..self.s.nnz_held() {
                    if self.s.is_live(q) {
                        p[self.s.index(q) + 1] += 1;
                    }
                }
                for r in 0..m {
                    p[r + 1] += p[r];
                }
                let nvals = p[m];
                let mut next = p.clone();
                let mut i = vec![0usize; nvals];
                let mut x = if self.iso {
                    Vec::new()
                } else {
                    vec![T::default(); nvals]
                };
                for k in 0..self.s.nvec() {
                    let j = self.s.vector_index(k);
                    for q in self.s.vector_range(k) {
                        if self.s.is_live(q) {
                            let r = self.s.index(q);
                            let dst = next[r];
                            next[r] += 1;
                            i[dst] = j;
                            if !self.iso {
                                x[dst] = self.x[q];
                            }
                        }
                    }
                }
                let s = Structure::from_parts_unchecked(n, m, Layout::Sparse { p, i }, false, 0);
                let t = Self::from_parts_unchecked(s, self.values_or_iso(x), self.iso);
                if self.s.is_hyper() {
                    t.conform_hyper()
                } else {
                    t
                }
            }
        }
    }

    /// Make a sparse matrix hypersparse if few of its vectors are non-empty
    pub(crate) fn conform_hyper(self) -> Self {
        if matches!(self.s.layout, Layout::Sparse { .. })
            && (self.s.nvec_nonempty() as f64) < HYPER_SWITCH * self.s.vdim as f64
            && self.s.nzombies == 0
        {
            self.to_hypersparse()
        } else {
            self
        }
    }

    /// Finish pending work: remove zombies and sort jumbled vectors
    pub fn wait(&mut self) {
        if self.s.nzombies > 0 {
            self.prune_zombies();
        }
        if self.s.jumbled {
            sort_vectors(self);
        }
    }

    fn prune_zombies(&mut self) {
        let nvec = self.s.nvec();
        let iso = self.iso;
        let (p, i) = match &mut self.s.layout {
            Layout::Sparse { p, i } | Layout::Hypersparse { p, i, .. } => (p, i),
            _ => return,
        };
        let mut dst = 0;
        let mut start = 0;
        for k in 0..nvec {
            let end = p[k + 1];
            for q in start..end {
                if !is_zombie(i[q]) {
                    i[dst] = i[q];
                    if !iso {
                        self.x[dst] = self.x[q];
                    }
                    dst += 1;
                }
            }
            start = end;
            p[k + 1] = dst;
        }
        i.truncate(dst);
        if !iso {
            self.x.truncate(dst);
        }
        self.s.nzombies = 0;
    }
}
