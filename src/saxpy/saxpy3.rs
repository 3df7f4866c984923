//! saxpy3: `C = A*B`, `C<M> = A*B` or `C<!M> = A*B` column by column
//!
//! Each column `C(:,j)` is the sum of the columns `A(:,k)` scaled by
//! `B(k,j)`. The sum is formed in a scratch table (Gustavson or hash,
//! chosen per task by the planner) in two phases over the same tasks: a
//! symbolic phase that only counts the entries of every column, fixing
//! `Cp`, and a numeric phase that writes `Ci` and `Cx` into the exact
//! slots the count reserved.
//!
//! Hash tasks emit rows in insertion order and leave C jumbled. Gustavson
//! tasks emit sorted rows: short columns sort what they collected, dense
//! ones scan the table.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::accumulator::{
    Accumulator, Insert, MaskMode, ScratchArena, TableKind, TableView, TaskGroup,
};
use crate::constants::GUSTAVSON_SCAN_DIVISOR;
use crate::error::{AxbError, Result};
use crate::matrix::config::AxbConfig;
use crate::matrix::pattern::{Layout, Structure};
use crate::matrix::{Mask, Matrix};
use crate::semiring::{
    dispatch, AddOp, Catalog, Classification, KernelVisitor, MultOp, Scalar, Semiring,
};
use crate::slice::{plan_saxpy3, saxpy_flops, SaxpyTask, SaxpyWork};
use crate::utils::{cumsum_in_place, split_by_offsets_mut, try_alloc};

/// How a scattered mask vector is read for this mask
pub(crate) fn mask_mode(mask: Option<&Mask>) -> MaskMode {
    match mask {
        None => MaskMode::Unmasked,
        Some(m) if m.is_complemented() => MaskMode::Complement,
        Some(_) => MaskMode::Mask,
    }
}

/// Columns produced by one saxpy3 pass, in work order
#[derive(Debug)]
pub(crate) struct SaxpyOutput<T> {
    pub p: Vec<usize>,
    pub h: Vec<usize>,
    pub i: Vec<usize>,
    pub x: Vec<T>,
    pub jumbled: bool,
}

impl<T: Scalar> SaxpyOutput<T> {
    /// Assemble C; sparse if the pass covered every column in order
    pub(crate) fn into_matrix(self, vlen: usize, vdim: usize, iso: Option<T>) -> Matrix<T> {
        let layout = if self.h.len() == vdim && self.h.iter().enumerate().all(|(k, &j)| k == j) {
            Layout::Sparse {
                p: self.p,
                i: self.i,
            }
        } else {
            Layout::Hypersparse {
                p: self.p,
                h: self.h,
                i: self.i,
            }
        };
        let s = Structure::from_parts_unchecked(vlen, vdim, layout, self.jumbled, 0);
        match iso {
            Some(v) => Matrix::from_parts_unchecked(s, vec![v], true),
            None => Matrix::from_parts_unchecked(s, self.x, false),
        }
    }
}

/// Read-only inputs shared by every task of a pass
struct Pass<'a, T> {
    a: &'a Matrix<T>,
    b: &'a Matrix<T>,
    work: &'a SaxpyWork,
    mask: Option<&'a Mask<'a>>,
    mode: MaskMode,
    a_is_pattern: bool,
    b_is_pattern: bool,
}

impl<T: Scalar> Pass<'_, T> {
    /// Reset the table for work vector `v` and scatter its mask column
    fn start_vector<Acc: Accumulator<T>>(&self, table: &mut Acc, v: usize) {
        table.next_vector();
        if let Some(m) = self.mask {
            m.for_each_true(self.work.cols[v], |i| table.scatter_mask(i));
        }
    }

    /// Call `f(i, k, pa, qb)` for every product `A(i,k) * B(k,j)` over the
    /// B slots in `slots`
    #[inline]
    fn for_each_product(&self, slots: Range<usize>, mut f: impl FnMut(usize, usize, usize, usize)) {
        let (a, b) = (&self.a.s, &self.b.s);
        for qb in slots {
            if !b.is_live(qb) {
                continue;
            }
            let k = b.index(qb);
            for pa in a.range_of(k) {
                if a.is_live(pa) {
                    f(a.index(pa), k, pa, qb);
                }
            }
        }
    }

    #[inline]
    fn aik(&self, pa: usize) -> T {
        if self.a_is_pattern {
            T::default()
        } else {
            self.a.value(pa)
        }
    }

    #[inline]
    fn bkj(&self, qb: usize) -> T {
        if self.b_is_pattern {
            T::default()
        } else {
            self.b.value(qb)
        }
    }
}

fn symbolic_coarse<T: Scalar, Acc: Accumulator<T>>(
    pass: &Pass<'_, T>,
    table: &mut Acc,
    vectors: Range<usize>,
    counts: &mut [usize],
) {
    for (v, count) in vectors.zip(counts.iter_mut()) {
        pass.start_vector(table, v);
        pass.for_each_product(pass.work.ranges[v].clone(), |i, _, _, _| {
            table.mark(i, pass.mode);
        });
        *count = table.present();
    }
}

fn symbolic_team<T: Scalar>(
    pass: &Pass<'_, T>,
    table: &mut TableView<'_, T>,
    kk: usize,
    members: &[Range<usize>],
) -> usize {
    pass.start_vector(table, kk);
    let team = TaskGroup::new(table, members.len());
    team.run(|member, lock| {
        let mut rows = Vec::new();
        pass.for_each_product(members[member].clone(), |i, _, _, _| rows.push(i));
        let mut table = lock.lock();
        for i in rows {
            table.mark(i, pass.mode);
        }
    });
    team.with_table(|table| table.present())
}

/// Numeric phase of a coarse task; returns true if it left a vector
/// unsorted
#[allow(clippy::too_many_arguments)]
fn numeric_coarse<T, Acc, A, M>(
    pass: &Pass<'_, T>,
    table: &mut Acc,
    kind: TableKind,
    add: &A,
    mult: &M,
    vectors: Range<usize>,
    cp: &[usize],
    ci: &mut [usize],
    mut cx: Option<&mut [T]>,
) -> bool
where
    T: Scalar,
    Acc: Accumulator<T>,
    A: AddOp<T>,
    M: MultOp<T>,
{
    let cvlen = pass.a.s.vlen;
    let base = cp[vectors.start];
    let mut jumbled = false;
    for v in vectors {
        let j = pass.work.cols[v];
        let range = cp[v] - base..cp[v + 1] - base;
        let ci_v = &mut ci[range.clone()];
        pass.start_vector(table, v);

        let mut n = 0;
        pass.for_each_product(pass.work.ranges[v].clone(), |i, k, pa, qb| {
            let outcome = table.upsert(i, pass.mode, add, || {
                mult.mult(pass.aik(pa), pass.bkj(qb), i, k, j)
            });
            if outcome == Insert::New {
                if let Some(slot) = ci_v.get_mut(n) {
                    *slot = i;
                }
                n += 1;
            }
        });

        match kind {
            TableKind::Gustavson if ci_v.len() > cvlen / GUSTAVSON_SCAN_DIVISOR => {
                let mut n = 0;
                table.for_each_present(|i, _| {
                    if let Some(slot) = ci_v.get_mut(n) {
                        *slot = i;
                    }
                    n += 1;
                });
            }
            TableKind::Gustavson => ci_v.sort_unstable(),
            TableKind::Hash => jumbled |= ci_v.len() > 1,
        }
        if let Some(cx) = cx.as_deref_mut() {
            for (dst, &i) in cx[range].iter_mut().zip(ci_v.iter()) {
                *dst = table.value_at(i);
            }
        }
    }
    jumbled
}

/// Numeric phase of a fine team; returns true if the vector is unsorted
#[allow(clippy::too_many_arguments)]
fn numeric_team<T, A, M>(
    pass: &Pass<'_, T>,
    table: &mut TableView<'_, T>,
    add: &A,
    mult: &M,
    kk: usize,
    members: &[Range<usize>],
    ci: &mut [usize],
    cx: Option<&mut [T]>,
) -> bool
where
    T: Scalar,
    A: AddOp<T>,
    M: MultOp<T>,
{
    let j = pass.work.cols[kk];
    pass.start_vector(table, kk);
    let team = TaskGroup::new(table, members.len());
    team.run(|member, lock| {
        let mut products: Vec<(usize, T)> = Vec::new();
        pass.for_each_product(members[member].clone(), |i, k, pa, qb| {
            products.push((i, mult.mult(pass.aik(pa), pass.bkj(qb), i, k, j)));
        });
        let mut table = lock.lock();
        for (i, t) in products {
            table.upsert(i, pass.mode, add, || t);
        }
    });
    team.with_table(|table| {
        let mut cx = cx;
        let mut n = 0;
        table.for_each_present(|i, v| {
            if let Some(slot) = ci.get_mut(n) {
                *slot = i;
            }
            if let Some(x) = cx.as_deref_mut().and_then(|x| x.get_mut(n)) {
                *x = v;
            }
            n += 1;
        });
        table.kind() == TableKind::Hash && n > 1
    })
}

struct Job<'c, 'w, T> {
    task: &'c SaxpyTask,
    table: &'c mut TableView<'w, T>,
    ci: &'c mut [usize],
    cx: Option<&'c mut [T]>,
}

struct NumericKernel<'a, 'c, 'w, T> {
    pass: &'a Pass<'a, T>,
    cp: &'a [usize],
    jobs: Vec<Job<'c, 'w, T>>,
}

impl<T: Catalog> KernelVisitor<T> for NumericKernel<'_, '_, '_, T> {
    type Output = bool;

    fn visit<A: AddOp<T>, M: MultOp<T>>(self, add: A, mult: M) -> bool {
        let Self { pass, cp, jobs } = self;
        jobs.into_par_iter()
            .map(|job| {
                let Job { task, table, ci, cx } = job;
                match task {
                    SaxpyTask::Coarse { kfirst, klast, .. } => {
                        let vectors = *kfirst..*klast;
                        match table {
                            TableView::Gustavson(t) => numeric_coarse(
                                pass,
                                t,
                                TableKind::Gustavson,
                                &add,
                                &mult,
                                vectors,
                                cp,
                                ci,
                                cx,
                            ),
                            TableView::Hash(t) => numeric_coarse(
                                pass,
                                t,
                                TableKind::Hash,
                                &add,
                                &mult,
                                vectors,
                                cp,
                                ci,
                                cx,
                            ),
                        }
                    }
                    SaxpyTask::Fine { kk, members, .. } => {
                        numeric_team(pass, table, &add, &mult, *kk, members, ci, cx)
                    }
                }
            })
            .reduce(|| false, |x, y| x || y)
    }
}

/// Run one saxpy3 pass over the vectors of B named by `work`.
///
/// # Arguments
/// * `a`, `b` - Operands of `C = A*B`, held by column
/// * `work` - The vectors of B to compute; C gets one vector per entry
/// * `flops` - Flops per work vector, from [`saxpy_flops`]
/// * `mask` - Mask honored through the scratch tables, if any
/// * `iso` - The iso value of C; values are then never computed
/// * `forced` - Table kind for every task, if the caller forced one
/// * `nthreads` - Threads available
///
/// # Errors
/// [`AxbError::OutOfMemory`] if the workspace cannot be allocated, and
/// [`AxbError::Panic`] if a hash table ran out of slots.
#[allow(clippy::too_many_arguments)]
pub(crate) fn saxpy3_pass<T: Catalog>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    work: &SaxpyWork,
    flops: &[usize],
    mask: Option<&Mask>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
    forced: Option<TableKind>,
    nthreads: usize,
    config: &AxbConfig,
) -> Result<SaxpyOutput<T>> {
    let nv = work.len();
    let plan = plan_saxpy3(
        &a.s,
        &b.s,
        work,
        flops,
        mask,
        forced,
        nthreads,
        &config.heuristics,
    );
    log::trace!(
        "saxpy3: {} vectors, {} flops, {} tasks ({} fine teams)",
        nv,
        plan.total_flops,
        plan.ntasks(),
        plan.nfine()
    );

    let mut arena = ScratchArena::<T>::new(
        &plan.table_specs(),
        iso.is_none(),
        config.system_params.cache_line_size,
    )?;
    let mut tables = arena.tables();
    let pass = Pass {
        a,
        b,
        work,
        mask,
        mode: mask_mode(mask),
        a_is_pattern: cls.a_is_pattern,
        b_is_pattern: cls.b_is_pattern,
    };

    // task boundaries over the work vectors
    let mut bounds: Vec<usize> = plan.tasks.iter().map(|t| t.vectors().start).collect();
    bounds.push(nv);

    // symbolic phase
    let failed = AtomicBool::new(false);
    let mut cp = try_alloc(nv + 1, 0usize)?;
    {
        let counts = split_by_offsets_mut(&mut cp[..nv], &bounds);
        plan.tasks
            .par_iter()
            .zip(tables.par_iter_mut())
            .zip(counts.into_par_iter())
            .for_each(|((task, table), counts)| {
                match task {
                    SaxpyTask::Coarse { kfirst, klast, .. } => match table {
                        TableView::Gustavson(t) => symbolic_coarse(&pass, t, *kfirst..*klast, counts),
                        TableView::Hash(t) => symbolic_coarse(&pass, t, *kfirst..*klast, counts),
                    },
                    SaxpyTask::Fine { kk, members, .. } => {
                        counts[0] = symbolic_team(&pass, table, *kk, members);
                    }
                }
                if table.overflowed() {
                    failed.store(true, Ordering::Relaxed);
                }
            });
    }
    if failed.load(Ordering::Relaxed) {
        return Err(AxbError::Panic(
            "saxpy3 hash table ran out of free slots".to_string(),
        ));
    }
    let cnz = cumsum_in_place(&mut cp);

    // numeric phase
    let mut ci = try_alloc(cnz, 0usize)?;
    let mut cx = if iso.is_none() {
        try_alloc(cnz, T::default())?
    } else {
        Vec::new()
    };
    let entry_bounds: Vec<usize> = bounds.iter().map(|&v| cp[v]).collect();
    let jumbled = {
        let ciparts = split_by_offsets_mut(&mut ci, &entry_bounds);
        let cxparts: Vec<Option<&mut [T]>> = if iso.is_none() {
            split_by_offsets_mut(&mut cx, &entry_bounds)
                .into_iter()
                .map(Some)
                .collect()
        } else {
            Vec::new()
        };
        let mut cxparts = cxparts.into_iter();
        let jobs: Vec<Job<'_, '_, T>> = plan
            .tasks
            .iter()
            .zip(tables.iter_mut())
            .zip(ciparts)
            .map(|((task, table), ci)| Job {
                task,
                table,
                ci,
                cx: cxparts.next().flatten(),
            })
            .collect();
        let kernel = NumericKernel {
            pass: &pass,
            cp: &cp,
            jobs,
        };
        dispatch(semiring, cls, kernel)
    };
    if tables.iter().any(|t| t.overflowed()) {
        return Err(AxbError::Panic(
            "saxpy3 hash table ran out of free slots".to_string(),
        ));
    }

    Ok(SaxpyOutput {
        p: cp,
        h: work.cols.clone(),
        i: ci,
        x: cx,
        jumbled,
    })
}

/// Compute `C = A*B` (optionally masked) with saxpy3 over all of B.
///
/// # Arguments
/// * `mask` - Mask honored through the scratch tables, if any
/// * `iso` - The iso value of C, if C is known to be iso
/// * `forced` - Table kind for every task, if the caller forced one
/// * `nthreads` - Threads available
#[allow(clippy::too_many_arguments)]
pub fn saxpy3<T: Catalog>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    mask: Option<&Mask>,
    semiring: &Semiring<T>,
    cls: &Classification,
    iso: Option<T>,
    forced: Option<TableKind>,
    nthreads: usize,
    config: &AxbConfig,
) -> Result<Matrix<T>> {
    let work = SaxpyWork::whole(&b.s);
    let flops = saxpy_flops(&a.s, &b.s, &work);
    let out = saxpy3_pass(
        a, b, &work, &flops, mask, semiring, cls, iso, forced, nthreads, config,
    )?;
    Ok(out.into_matrix(a.s.vlen, b.s.vdim, iso))
}
