use crate::{check_operand, Result, Scalar};
use rayon::prelude::*;

/// CPU implementation of (conjugate) transposition.
///
/// Reads an `m x n` column-major operand with leading dimension `lda` and
/// returns its `n x m` transpose packed contiguously (leading dimension `n`).
pub fn transpose<T: Scalar>(
    m: usize,
    n: usize,
    a: &[T],
    lda: usize,
    conjugate: bool,
) -> Result<Vec<T>> {
    check_operand("A", a, m, n, lda)?;
    let mut out = vec![T::zero(); m * n];
    if m == 0 || n == 0 {
        return Ok(out);
    }

    // Column `i` of the output is row `i` of the input.
    out.par_chunks_mut(n).enumerate().for_each(|(i, out_col)| {
        for (j, out_elem) in out_col.iter_mut().enumerate() {
            let value = a[i + j * lda];
            *out_elem = if conjugate { value.conj() } else { value };
        }
    });

    Ok(out)
}
