//! The three SUMMA variants. `C` is always `[MC,MR]` here.

use super::{local_gemm, panel, workspace};
use crate::blas::level1::axpy;
use crate::dist::DistPair;
use crate::dist_matrix::{DistMatrix, DistView, DistViewMut};
use crate::error::Result;
use distla_kernels::{Orientation, Scalar};
use tracing::trace;

/// Moves panels of the contracted dimension past a stationary `C`.
///
/// Each step broadcasts a column panel of `op(A)` along grid rows (as
/// `[MC,*]`) and a row panel of `op(B)` along grid columns (as `[*,MR]`),
/// then every process updates its piece of `C` locally.
pub(super) fn stationary_c<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    c: &mut DistViewMut<'_, T>,
) -> Result<()> {
    let (m, n) = (c.height(), c.width());
    let k = super::op_dims(orient_a, a).1;
    let blocksize = a.grid().config().blocksize;
    let like = *c.layout();

    for start in (0..k).step_by(blocksize) {
        let kb = blocksize.min(k - start);
        trace!(start, kb, "SummaC panel");
        let a1 = if orient_a.is_transposed() {
            panel(DistPair::STAR_MC, &like, &a.view(start, 0, kb, m)?)?
        } else {
            panel(DistPair::MC_STAR, &like, &a.view(0, start, m, kb)?)?
        };
        let b1 = if orient_b.is_transposed() {
            panel(DistPair::MR_STAR, &like, &b.view(0, start, n, kb)?)?
        } else {
            panel(DistPair::STAR_MR, &like, &b.view(start, 0, kb, n)?)?
        };
        local_gemm(orient_a, orient_b, alpha, &a1.as_view(), &b1.as_view(), T::one(), c)?;
    }
    Ok(())
}

/// Keeps `A` in place and sweeps column panels of `C`.
///
/// For each panel, `op(B1)` is spread as `[MR,*]` to line up with `A`'s
/// columns, every process forms its partial product, and the partials are
/// summed across grid rows into a `[MC,*]` panel that is added into `C`.
pub(super) fn stationary_a<T: Scalar>(
    orient_b: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    c: &mut DistViewMut<'_, T>,
) -> Result<()> {
    let (m, n) = (c.height(), c.width());
    let k = a.width();
    let grid = c.grid().clone();
    let blocksize = grid.config().blocksize;

    let proxy;
    let a = if a.dist() == DistPair::MC_MR && a.col_align() == c.col_align() {
        *a
    } else {
        let mut copy = DistMatrix::new(&grid, DistPair::MC_MR);
        copy.align_cols(c.col_align())?;
        copy.resize(m, k)?;
        copy.copy_from(a)?;
        proxy = copy;
        proxy.as_view()
    };
    let a_layout = *a.layout();

    for start in (0..n).step_by(blocksize) {
        let nb = blocksize.min(n - start);
        trace!(start, nb, "SummaA panel");
        let b1 = if orient_b.is_transposed() {
            panel(DistPair::STAR_MR, &a_layout, &b.view(start, 0, nb, k)?)?
        } else {
            panel(DistPair::MR_STAR, &a_layout, &b.view(0, start, k, nb)?)?
        };
        let mut d1 = workspace(&grid, DistPair::MC_STAR, &a_layout, m, nb)?;
        local_gemm(
            Orientation::Normal,
            orient_b,
            alpha,
            &a,
            &b1.as_view(),
            T::zero(),
            &mut d1.as_view_mut(),
        )?;
        grid.mr_comm().all_reduce_sum(d1.local_mut().data_mut())?;
        axpy(T::one(), &d1.as_view(), &mut c.view_mut(0, start, m, nb)?)?;
    }
    Ok(())
}

/// Keeps `B` in place and sweeps row panels of `C`.
///
/// Mirror image of [`stationary_a`]: `op(A1)` is spread as `[*,MC]`, the
/// partials are summed across grid columns into a `[*,MR]` panel.
pub(super) fn stationary_b<T: Scalar>(
    orient_a: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    c: &mut DistViewMut<'_, T>,
) -> Result<()> {
    let (m, n) = (c.height(), c.width());
    let k = b.height();
    let grid = c.grid().clone();
    let blocksize = grid.config().blocksize;

    let proxy;
    let b = if b.dist() == DistPair::MC_MR && b.row_align() == c.row_align() {
        *b
    } else {
        let mut copy = DistMatrix::new(&grid, DistPair::MC_MR);
        copy.align_rows(c.row_align())?;
        copy.resize(k, n)?;
        copy.copy_from(b)?;
        proxy = copy;
        proxy.as_view()
    };
    let b_layout = *b.layout();

    for start in (0..m).step_by(blocksize) {
        let mb = blocksize.min(m - start);
        trace!(start, mb, "SummaB panel");
        let a1 = if orient_a.is_transposed() {
            panel(DistPair::MC_STAR, &b_layout, &a.view(0, start, k, mb)?)?
        } else {
            panel(DistPair::STAR_MC, &b_layout, &a.view(start, 0, mb, k)?)?
        };
        let mut d1 = workspace(&grid, DistPair::STAR_MR, &b_layout, mb, n)?;
        local_gemm(
            orient_a,
            Orientation::Normal,
            alpha,
            &a1.as_view(),
            &b,
            T::zero(),
            &mut d1.as_view_mut(),
        )?;
        grid.mc_comm().all_reduce_sum(d1.local_mut().data_mut())?;
        axpy(T::one(), &d1.as_view(), &mut c.view_mut(start, 0, mb, n)?)?;
    }
    Ok(())
}
