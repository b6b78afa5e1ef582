//! Triangular rank-2k update:
//! `E := alpha * op(A) * op(B) + beta * op(C) * op(D) + gamma * E` on one
//! triangle of `E`.
//!
//! The distributed driver moves panels of the contracted dimension into
//! `[MC,*]`/`[*,MR]` form (or the transposed forms), exactly like SUMMA's
//! stationary-`C` variant, and hands them to [`local_trr2k`]. The local
//! routine halves `E` until the diagonal blocks are small, computing the
//! off-diagonal block of each split with a plain local gemm and skipping the
//! quadrant outside the triangle entirely.

use super::{check_same_grid, local_gemm, op_dims, panel};
use crate::blas::level1::{axpy_triangle, scale_trapezoid, UpperOrLower};
use crate::dist::{DistPair, Layout};
use crate::dist_matrix::{DistMatrix, DistView, DistViewMut};
use crate::error::{DistError, Result};
use distla_kernels::{Orientation, Scalar};
use tracing::{debug, trace};

/// Operands of one rank-2k update, as views of the same rows/columns of `E`.
struct Operands<'a, 'b, T> {
    orient: [Orientation; 4],
    a: &'b DistView<'a, T>,
    b: &'b DistView<'a, T>,
    c: &'b DistView<'a, T>,
    d: &'b DistView<'a, T>,
}

/// `op(A)` rows `[r0, r0 + h)` and `op(B)` columns `[c0, c0 + w)`, and the
/// same for `C` and `D`.
struct Block<'a, T> {
    a: DistView<'a, T>,
    b: DistView<'a, T>,
    c: DistView<'a, T>,
    d: DistView<'a, T>,
}

impl<'a, T: Scalar> Operands<'a, '_, T> {
    fn block(&self, r0: usize, h: usize, c0: usize, w: usize) -> Result<Block<'a, T>> {
        let [oa, ob, oc, od] = self.orient;
        Ok(Block {
            a: op_rows(oa, self.a, r0, h)?,
            b: op_cols(ob, self.b, c0, w)?,
            c: op_rows(oc, self.c, r0, h)?,
            d: op_cols(od, self.d, c0, w)?,
        })
    }
}

fn op_rows<'a, T: Scalar>(orient: Orientation, x: &DistView<'a, T>, r0: usize, h: usize) -> Result<DistView<'a, T>> {
    if orient.is_transposed() {
        x.view(0, r0, x.height(), h)
    } else {
        x.view(r0, 0, h, x.width())
    }
}

fn op_cols<'a, T: Scalar>(orient: Orientation, x: &DistView<'a, T>, c0: usize, w: usize) -> Result<DistView<'a, T>> {
    if orient.is_transposed() {
        x.view(c0, 0, w, x.width())
    } else {
        x.view(0, c0, x.height(), w)
    }
}

/// `E := alpha op(A) op(B) + beta op(C) op(D) + gamma E` on the `uplo`
/// triangle of the local pieces.
///
/// `E` is `[MC,MR]`; `op(A)` and `op(C)` have their rows distributed like
/// `E`'s rows (`[MC,*]`, or `[*,MC]` when transposed) and `op(B)`, `op(D)`
/// their columns like `E`'s columns (`[*,MR]`, or `[MR,*]`). No
/// communication.
///
/// # Errors
///
/// `DistError::Nonconformal` if `E` is not square, a product does not fit
/// `E`, or the two products contract over different depths.
#[allow(clippy::too_many_arguments)]
pub fn local_trr2k<T: Scalar>(
    uplo: UpperOrLower,
    orient_a: Orientation,
    orient_b: Orientation,
    orient_c: Orientation,
    orient_d: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    beta: T,
    c: &DistView<'_, T>,
    d: &DistView<'_, T>,
    gamma: T,
    e: &mut DistViewMut<'_, T>,
) -> Result<()> {
    check_operands([orient_a, orient_b, orient_c, orient_d], a, b, c, d, e.height(), e.width())?;
    let ops = Operands {
        orient: [orient_a, orient_b, orient_c, orient_d],
        a,
        b,
        c,
        d,
    };
    let threshold = e.grid().width() * e.grid().config().local_trr2k_blocksize;
    recurse(uplo, alpha, beta, gamma, &ops, e, threshold)
}

fn recurse<T: Scalar>(
    uplo: UpperOrLower,
    alpha: T,
    beta: T,
    gamma: T,
    ops: &Operands<'_, '_, T>,
    e: &mut DistViewMut<'_, T>,
    threshold: usize,
) -> Result<()> {
    let n = e.height();
    if n < threshold || n < 2 {
        return kernel(uplo, alpha, beta, gamma, ops, e);
    }
    let half = n / 2;
    let rest = n - half;
    off_diagonal(uplo, alpha, beta, gamma, ops, e, half)?;
    let top = ops.block(0, half, 0, half)?;
    let bottom = ops.block(half, rest, half, rest)?;
    recurse_block(uplo, alpha, beta, gamma, ops.orient, &top, &mut e.view_mut(0, 0, half, half)?, threshold)?;
    recurse_block(uplo, alpha, beta, gamma, ops.orient, &bottom, &mut e.view_mut(half, half, rest, rest)?, threshold)
}

#[allow(clippy::too_many_arguments)]
fn recurse_block<T: Scalar>(
    uplo: UpperOrLower,
    alpha: T,
    beta: T,
    gamma: T,
    orient: [Orientation; 4],
    block: &Block<'_, T>,
    e: &mut DistViewMut<'_, T>,
    threshold: usize,
) -> Result<()> {
    let ops = Operands {
        orient,
        a: &block.a,
        b: &block.b,
        c: &block.c,
        d: &block.d,
    };
    recurse(uplo, alpha, beta, gamma, &ops, e, threshold)
}

/// The block of `E` strictly inside the triangle gets a full update with
/// `gamma` folded into the first product.
fn off_diagonal<T: Scalar>(
    uplo: UpperOrLower,
    alpha: T,
    beta: T,
    gamma: T,
    ops: &Operands<'_, '_, T>,
    e: &mut DistViewMut<'_, T>,
    half: usize,
) -> Result<()> {
    let [oa, ob, oc, od] = ops.orient;
    let n = e.height();
    let rest = n - half;
    let (block, mut target) = match uplo {
        UpperOrLower::Lower => (ops.block(half, rest, 0, half)?, e.view_mut(half, 0, rest, half)?),
        UpperOrLower::Upper => (ops.block(0, half, half, rest)?, e.view_mut(0, half, half, rest)?),
    };
    local_gemm(oa, ob, alpha, &block.a, &block.b, gamma, &mut target)?;
    local_gemm(oc, od, beta, &block.c, &block.d, T::one(), &mut target)
}

/// Small-block update: scale the triangle by `gamma`, update the
/// off-diagonal block directly, and the two diagonal blocks through a
/// temporary so only their triangles are touched.
fn kernel<T: Scalar>(
    uplo: UpperOrLower,
    alpha: T,
    beta: T,
    gamma: T,
    ops: &Operands<'_, '_, T>,
    e: &mut DistViewMut<'_, T>,
) -> Result<()> {
    let [oa, ob, oc, od] = ops.orient;
    let n = e.height();
    let half = n / 2;
    let rest = n - half;

    scale_trapezoid(gamma, uplo, e);
    off_diagonal(uplo, alpha, beta, T::one(), ops, e, half)?;

    for (start, size) in [(0, half), (half, rest)] {
        if size == 0 {
            continue;
        }
        let block = ops.block(start, size, start, size)?;
        let mut diag = e.view_mut(start, start, size, size)?;
        let mut f = DistMatrix::new(diag.grid(), DistPair::MC_MR);
        f.align(diag.col_align(), diag.row_align())?;
        f.resize(size, size)?;
        local_gemm(oa, ob, alpha, &block.a, &block.b, T::zero(), &mut f.as_view_mut())?;
        local_gemm(oc, od, beta, &block.c, &block.d, T::one(), &mut f.as_view_mut())?;
        axpy_triangle(uplo, T::one(), &f.as_view(), &mut diag)?;
    }
    Ok(())
}

/// Distributed rank-2k update of one triangle of `E`.
///
/// Operands may have any distribution; `E` is updated through an `[MC,MR]`
/// copy when it has another one. Both products must share the contracted
/// dimension. Collective over the grid.
///
/// # Errors
///
/// Before any communication: `DistError::Nonconformal` if `E` is not square
/// or a product does not fit it, `DistError::UnsupportedRedistribution` if the
/// operands live on different grids.
#[allow(clippy::too_many_arguments)]
pub fn trr2k<T: Scalar>(
    uplo: UpperOrLower,
    orient_a: Orientation,
    orient_b: Orientation,
    orient_c: Orientation,
    orient_d: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    beta: T,
    c: &DistView<'_, T>,
    d: &DistView<'_, T>,
    gamma: T,
    e: &mut DistMatrix<T>,
) -> Result<()> {
    check_same_grid(e.grid(), &[a, b, c, d], e.dist())?;
    let k = check_operands([orient_a, orient_b, orient_c, orient_d], a, b, c, d, e.height(), e.width())?;
    let n = e.height();
    debug!(n, k, uplo = ?uplo, "trr2k");

    if k == 0 {
        scale_trapezoid(gamma, uplo, &mut e.as_view_mut());
        return Ok(());
    }
    if e.dist() == DistPair::MC_MR {
        let orient = [orient_a, orient_b, orient_c, orient_d];
        return panels(uplo, orient, alpha, a, b, beta, c, d, gamma, &mut e.as_view_mut());
    }
    let mut proxy = DistMatrix::from_view(DistPair::MC_MR, &e.as_view())?;
    panels(
        uplo,
        [orient_a, orient_b, orient_c, orient_d],
        alpha,
        a,
        b,
        beta,
        c,
        d,
        gamma,
        &mut proxy.as_view_mut(),
    )?;
    e.local = crate::blas::level1::conform(&proxy.as_view(), e.layout())?.local;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn panels<T: Scalar>(
    uplo: UpperOrLower,
    orient: [Orientation; 4],
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    beta: T,
    c: &DistView<'_, T>,
    d: &DistView<'_, T>,
    gamma: T,
    e: &mut DistViewMut<'_, T>,
) -> Result<()> {
    let [oa, ob, oc, od] = orient;
    let n = e.height();
    let k = op_dims(oa, a).1;
    let blocksize = e.grid().config().blocksize;
    let like = *e.layout();

    for start in (0..k).step_by(blocksize) {
        let kb = blocksize.min(k - start);
        trace!(start, kb, "Trr2k panel");
        let a1 = row_panel(oa, a, start, kb, n, &like)?;
        let b1 = col_panel(ob, b, start, kb, n, &like)?;
        let c1 = row_panel(oc, c, start, kb, n, &like)?;
        let d1 = col_panel(od, d, start, kb, n, &like)?;
        let scale = if start == 0 { gamma } else { T::one() };
        local_trr2k(
            uplo,
            oa,
            ob,
            oc,
            od,
            alpha,
            &a1.as_view(),
            &b1.as_view(),
            beta,
            &c1.as_view(),
            &d1.as_view(),
            scale,
            e,
        )?;
    }
    Ok(())
}

/// Columns `[start, start + kb)` of `op(X)` (`n x k`), with rows spread like
/// `E`'s rows.
fn row_panel<T: Scalar>(
    orient: Orientation,
    x: &DistView<'_, T>,
    start: usize,
    kb: usize,
    n: usize,
    like: &Layout,
) -> Result<DistMatrix<T>> {
    if orient.is_transposed() {
        panel(DistPair::STAR_MC, like, &x.view(start, 0, kb, n)?)
    } else {
        panel(DistPair::MC_STAR, like, &x.view(0, start, n, kb)?)
    }
}

/// Rows `[start, start + kb)` of `op(X)` (`k x n`), with columns spread like
/// `E`'s columns.
fn col_panel<T: Scalar>(
    orient: Orientation,
    x: &DistView<'_, T>,
    start: usize,
    kb: usize,
    n: usize,
    like: &Layout,
) -> Result<DistMatrix<T>> {
    if orient.is_transposed() {
        panel(DistPair::MR_STAR, like, &x.view(0, start, n, kb)?)
    } else {
        panel(DistPair::STAR_MR, like, &x.view(start, 0, kb, n)?)
    }
}

/// Checks that `E` is square and both products fit it with the same depth,
/// returning that depth.
fn check_operands<T: Scalar>(
    orient: [Orientation; 4],
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    c: &DistView<'_, T>,
    d: &DistView<'_, T>,
    height: usize,
    width: usize,
) -> Result<usize> {
    if height != width {
        return Err(DistError::nonconformal(
            "Trr2k",
            format!("E must be square, got {height}x{width}"),
        ));
    }
    let [oa, ob, oc, od] = orient;
    let k = product_depth(oa, ob, a, b, height, "A", "B")?;
    let k2 = product_depth(oc, od, c, d, height, "C", "D")?;
    if k != k2 {
        return Err(DistError::nonconformal(
            "Trr2k",
            format!("op(A)op(B) contracts over {k} but op(C)op(D) over {k2}"),
        ));
    }
    Ok(k)
}

/// Contracted dimension of `op(X) op(Y)` for an `n x n` result.
fn product_depth<T: Scalar>(
    orient_x: Orientation,
    orient_y: Orientation,
    x: &DistView<'_, T>,
    y: &DistView<'_, T>,
    n: usize,
    x_name: &str,
    y_name: &str,
) -> Result<usize> {
    let (xm, xk) = op_dims(orient_x, x);
    let (yk, yn) = op_dims(orient_y, y);
    if xm != n || yn != n || xk != yk {
        return Err(DistError::nonconformal(
            "Trr2k",
            format!("op({x_name}) is {xm}x{xk}, op({y_name}) is {yk}x{yn}, E is {n}x{n}"),
        ));
    }
    Ok(xk)
}
