//! # Level-3 Operations
//!
//! Distributed matrix products built from three ingredients: redistributing
//! panels so they line up with the output, a local [`distla_kernels::gemm`],
//! and (for the stationary-operand variants) a sum-reduction along one grid
//! axis.
//!
//! | variant   | stays put | loops over          | reduction      |
//! |-----------|-----------|---------------------|----------------|
//! | `SummaC`  | `C`       | panels of `k`       | none           |
//! | `SummaA`  | `A`       | column panels of `C`| over grid rows |
//! | `SummaB`  | `B`       | row panels of `C`   | over grid cols |
//!
//! `SummaA` needs `A` untransposed and `SummaB` needs `B` untransposed.
//! [`GemmAlgorithm::Default`] picks one from the shapes: a short-and-deep
//! product keeps the big operand in place, everything else moves panels of
//! `k` past `C`.

mod summa;
mod trr2k;

pub use trr2k::{local_trr2k, trr2k};

use crate::dist::{Dist, DistPair, Layout};
use crate::dist_matrix::{DistMatrix, DistView, DistViewMut};
use crate::error::{DistError, Result};
use crate::grid::Grid;
use distla_kernels::{Orientation, Scalar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Which SUMMA variant [`gemm`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GemmAlgorithm {
    /// The configured variant, or a shape-based choice.
    #[default]
    Default,
    SummaA,
    SummaB,
    SummaC,
}

/// `C := alpha * op(A) * op(B) + beta * C`.
///
/// `A`, `B` and `C` may have any distribution; `C` is worked on through an
/// `[MC,MR]` copy when it has another one. Collective over the grid.
///
/// # Errors
///
/// All raised before any communication:
/// - `DistError::Nonconformal` (for instance `Nonconformal GemmNT`) if the
///   dimensions do not agree.
/// - `DistError::UnsupportedRedistribution` if the operands live on different
///   grids or `alg` cannot handle the orientations.
#[allow(clippy::too_many_arguments)]
pub fn gemm<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    beta: T,
    c: &mut DistMatrix<T>,
    alg: GemmAlgorithm,
) -> Result<()> {
    check_same_grid(c.grid(), &[a, b], c.dist())?;
    let (m, n, k) = conformal_dims(orient_a, orient_b, a, b, c.height(), c.width())?;
    let grid = Arc::clone(c.grid());
    let variant = select_variant(&grid, orient_a, orient_b, alg, (m, n, k))?;
    debug!(
        op = %gemm_name(orient_a, orient_b),
        variant = ?variant,
        m,
        n,
        k,
        "gemm"
    );

    crate::blas::scale(beta, &mut c.as_view_mut())?;
    if m == 0 || n == 0 || k == 0 {
        return Ok(());
    }

    if c.dist() == DistPair::MC_MR {
        return run_variant(variant, orient_a, orient_b, alpha, a, b, &mut c.as_view_mut());
    }
    let mut proxy = DistMatrix::from_view(DistPair::MC_MR, &c.as_view())?;
    run_variant(variant, orient_a, orient_b, alpha, a, b, &mut proxy.as_view_mut())?;
    c.local = crate::blas::level1::conform(&proxy.as_view(), c.layout())?.local;
    Ok(())
}

/// [`gemm`] into a fresh `[MC,MR]` matrix.
pub fn gemm_new<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    alg: GemmAlgorithm,
) -> Result<DistMatrix<T>> {
    check_same_grid(a.grid(), &[b], DistPair::MC_MR)?;
    let m = if orient_a.is_transposed() { a.width() } else { a.height() };
    let n = if orient_b.is_transposed() { b.height() } else { b.width() };
    let mut c = DistMatrix::zeros(a.grid(), DistPair::MC_MR, m, n)?;
    gemm(orient_a, orient_b, alpha, a, b, T::zero(), &mut c, alg)?;
    Ok(c)
}

/// `C := alpha * op(A) * op(B) + beta * C` on the local pieces only.
///
/// The distributions must already line up: the rows of `op(A)` are
/// distributed like the rows of `C`, the columns of `op(B)` like the columns
/// of `C`, and the contracted dimension the same way in both, all with equal
/// alignments. No communication.
///
/// # Errors
///
/// Returns `DistError::Unsupported` if the layouts do not line up and
/// `DistError::Nonconformal` if the global dimensions do not agree.
#[allow(clippy::too_many_arguments)]
pub fn local_gemm<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    beta: T,
    c: &mut DistViewMut<'_, T>,
) -> Result<()> {
    conformal_dims(orient_a, orient_b, a, b, c.height(), c.width())?;
    let c_rows = (c.dist().col(), c.col_align());
    let c_cols = (c.dist().row(), c.row_align());
    let a_rows = op_rows(orient_a, a.layout());
    let a_cols = op_cols(orient_a, a.layout());
    let b_rows = op_rows(orient_b, b.layout());
    let b_cols = op_cols(orient_b, b.layout());
    if a_rows != c_rows || b_cols != c_cols || a_cols != b_rows {
        return Err(DistError::Unsupported(format!(
            "Local{}: op(A) {} x op(B) {} cannot update C {} in place",
            gemm_name(orient_a, orient_b),
            a.dist(),
            b.dist(),
            c.dist()
        )));
    }

    let (al, bl) = (a.local(), b.local());
    let local_c = c.local_mut();
    let (m, n, ldc) = (local_c.height(), local_c.width(), local_c.ldim());
    let k = distla_kernels::check_conformal(orient_a, orient_b, al.dims(), bl.dims(), (m, n))?;
    let backend: distla_kernels::Backend = a.grid().config().kernel.into();
    distla_kernels::gemm(
        backend,
        orient_a,
        orient_b,
        m,
        n,
        k,
        alpha,
        al.data(),
        al.ldim(),
        bl.data(),
        bl.ldim(),
        beta,
        local_c.data_mut(),
        ldc,
    )?;
    Ok(())
}

fn run_variant<T: Scalar>(
    variant: GemmAlgorithm,
    orient_a: Orientation,
    orient_b: Orientation,
    alpha: T,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    c: &mut DistViewMut<'_, T>,
) -> Result<()> {
    match variant {
        GemmAlgorithm::SummaA => summa::stationary_a(orient_b, alpha, a, b, c),
        GemmAlgorithm::SummaB => summa::stationary_b(orient_a, alpha, a, b, c),
        GemmAlgorithm::SummaC | GemmAlgorithm::Default => {
            summa::stationary_c(orient_a, orient_b, alpha, a, b, c)
        }
    }
}

/// Resolves `Default` and rejects variants that cannot handle the
/// orientations.
fn select_variant(
    grid: &Grid,
    orient_a: Orientation,
    orient_b: Orientation,
    alg: GemmAlgorithm,
    (m, n, k): (usize, usize, usize),
) -> Result<GemmAlgorithm> {
    let supported = |variant: GemmAlgorithm| match variant {
        GemmAlgorithm::SummaA => !orient_a.is_transposed(),
        GemmAlgorithm::SummaB => !orient_b.is_transposed(),
        GemmAlgorithm::SummaC | GemmAlgorithm::Default => true,
    };
    if alg != GemmAlgorithm::Default {
        if !supported(alg) {
            return Err(DistError::UnsupportedRedistribution {
                src: DistPair::MC_MR,
                dst: DistPair::MC_MR,
                reason: format!(
                    "{alg:?} does not handle {}",
                    gemm_name(orient_a, orient_b)
                ),
            });
        }
        return Ok(alg);
    }

    let configured = grid.config().gemm_algorithm;
    if configured != GemmAlgorithm::Default && supported(configured) {
        return Ok(configured);
    }
    let variant = if !orient_b.is_transposed() && m <= n && 2 * m <= k {
        GemmAlgorithm::SummaB
    } else if !orient_a.is_transposed() && n <= m && 2 * n <= k {
        GemmAlgorithm::SummaA
    } else {
        GemmAlgorithm::SummaC
    };
    Ok(variant)
}

/// `(m, n, k)` of `op(A) * op(B)` into an `height x width` result.
fn conformal_dims<T: Scalar>(
    orient_a: Orientation,
    orient_b: Orientation,
    a: &DistView<'_, T>,
    b: &DistView<'_, T>,
    height: usize,
    width: usize,
) -> Result<(usize, usize, usize)> {
    let (m, k) = op_dims(orient_a, a);
    let (kb, n) = op_dims(orient_b, b);
    if m != height || n != width || k != kb {
        return Err(DistError::nonconformal(
            gemm_name(orient_a, orient_b),
            format!("op(A) is {m}x{k}, op(B) is {kb}x{n}, C is {height}x{width}"),
        ));
    }
    Ok((m, n, k))
}

pub(crate) fn op_dims<T: Scalar>(orient: Orientation, x: &DistView<'_, T>) -> (usize, usize) {
    if orient.is_transposed() {
        (x.width(), x.height())
    } else {
        (x.height(), x.width())
    }
}

fn op_rows(orient: Orientation, layout: &Layout) -> (Dist, usize) {
    if orient.is_transposed() {
        (layout.dist.row(), layout.row_align)
    } else {
        (layout.dist.col(), layout.col_align)
    }
}

fn op_cols(orient: Orientation, layout: &Layout) -> (Dist, usize) {
    if orient.is_transposed() {
        (layout.dist.col(), layout.col_align)
    } else {
        (layout.dist.row(), layout.row_align)
    }
}

pub(crate) fn gemm_name(orient_a: Orientation, orient_b: Orientation) -> String {
    format!("Gemm{}{}", orient_a.as_char(), orient_b.as_char())
}

pub(crate) fn check_same_grid<T: Scalar>(
    grid: &Arc<Grid>,
    operands: &[&DistView<'_, T>],
    dst: DistPair,
) -> Result<()> {
    match operands.iter().find(|view| !Arc::ptr_eq(view.grid(), grid)) {
        Some(view) => Err(DistError::UnsupportedRedistribution {
            src: view.dist(),
            dst,
            reason: "operands live on different grids".to_string(),
        }),
        None => Ok(()),
    }
}

/// A copy of `src` in `dist`, aligned with `like` wherever the two
/// distributions share a grid axis.
pub(crate) fn panel<T: Scalar>(dist: DistPair, like: &Layout, src: &DistView<'_, T>) -> Result<DistMatrix<T>> {
    let mut copy = DistMatrix::new(src.grid(), dist);
    copy.align_with(like)?;
    copy.resize(src.height(), src.width())?;
    copy.copy_from(src)?;
    Ok(copy)
}

/// A zero `height x width` matrix in `dist`, aligned with `like`.
pub(crate) fn workspace<T: Scalar>(
    grid: &Arc<Grid>,
    dist: DistPair,
    like: &Layout,
    height: usize,
    width: usize,
) -> Result<DistMatrix<T>> {
    let mut matrix = DistMatrix::new(grid, dist);
    matrix.align_with(like)?;
    matrix.resize(height, width)?;
    Ok(matrix)
}
