use crate::{check_operand, Result, Scalar};
use rayon::prelude::*;

/// `X := alpha * X` over an `m x n` column-major operand.
///
/// A zero `alpha` writes zeros instead of multiplying, so NaN entries are
/// cleared rather than propagated.
pub fn scale<T: Scalar>(m: usize, n: usize, alpha: T, x: &mut [T], ldx: usize) -> Result<()> {
    check_operand("X", x, m, n, ldx)?;
    if m == 0 || n == 0 || alpha == T::one() {
        return Ok(());
    }
    x.par_chunks_mut(ldx).take(n).for_each(|col| {
        if alpha == T::zero() {
            col[..m].fill(T::zero());
        } else {
            col[..m].iter_mut().for_each(|v| *v *= alpha);
        }
    });
    Ok(())
}

/// `Y := alpha * X + Y` for two `m x n` column-major operands.
pub fn axpy<T: Scalar>(
    m: usize,
    n: usize,
    alpha: T,
    x: &[T],
    ldx: usize,
    y: &mut [T],
    ldy: usize,
) -> Result<()> {
    check_operand("X", x, m, n, ldx)?;
    check_operand("Y", y, m, n, ldy)?;
    if m == 0 || n == 0 || alpha == T::zero() {
        return Ok(());
    }
    y.par_chunks_mut(ldy)
        .take(n)
        .enumerate()
        .for_each(|(j, col)| {
            let x_col = &x[j * ldx..j * ldx + m];
            for (out, &val) in col[..m].iter_mut().zip(x_col) {
                *out += alpha * val;
            }
        });
    Ok(())
}
