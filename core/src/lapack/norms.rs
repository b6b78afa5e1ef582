//! # Matrix norms
//!
//! Every norm here is collective over the owner communicator of the
//! operand's distribution, the smallest communicator in which each entry has
//! exactly one holder. Partial results are combined there, so replicated
//! copies are never counted twice and every process returns the same value.
//!
//! | norm              | definition                          |
//! |-------------------|-------------------------------------|
//! | [`max_norm`]      | `max |a_ij|`                        |
//! | [`one_norm`]      | largest column sum of `|a_ij|`      |
//! | [`infinity_norm`] | largest row sum of `|a_ij|`         |
//! | [`frobenius_norm`]| `sqrt(sum |a_ij|^2)`                |
//!
//! [`hermitian_one_norm`] reads only one triangle and treats the other as its
//! conjugate mirror.

use crate::blas::UpperOrLower;
use crate::dist_matrix::DistView;
use crate::error::{DistError, Result};
use distla_kernels::Scalar;
use num_traits::Float;

pub fn max_norm<T: Scalar>(a: &DistView<'_, T>) -> Result<T::Real> {
    let local = a.local();
    let mut largest = <T::Real as num_traits::Zero>::zero();
    for jl in 0..local.width() {
        for il in 0..local.height() {
            largest = max(largest, local.get(il, jl).modulus());
        }
    }
    let mut result = [largest];
    if let Some(comm) = a.grid().comm(a.dist().owner_scope()) {
        comm.all_reduce_with(&mut result, max)?;
    }
    Ok(result[0])
}

/// Maximum absolute column sum.
pub fn one_norm<T: Scalar>(a: &DistView<'_, T>) -> Result<T::Real> {
    let row = a.row_ownership();
    let local = a.local();
    let mut sums = vec![<T::Real as num_traits::Zero>::zero(); a.width()];
    for jl in 0..local.width() {
        let j = row.global_index(jl);
        for il in 0..local.height() {
            sums[j] += local.get(il, jl).modulus();
        }
    }
    largest_sum(a, sums)
}

/// Maximum absolute row sum.
pub fn infinity_norm<T: Scalar>(a: &DistView<'_, T>) -> Result<T::Real> {
    let col = a.col_ownership();
    let local = a.local();
    let mut sums = vec![<T::Real as num_traits::Zero>::zero(); a.height()];
    for jl in 0..local.width() {
        for il in 0..local.height() {
            sums[col.global_index(il)] += local.get(il, jl).modulus();
        }
    }
    largest_sum(a, sums)
}

/// `sqrt(sum |a_ij|^2)`, accumulated as a scaled sum of squares so that
/// large entries do not overflow.
pub fn frobenius_norm<T>(a: &DistView<'_, T>) -> Result<T::Real>
where
    T: Scalar,
    T::Real: Float,
{
    let local = a.local();
    let zero: T::Real = num_traits::zero();
    let one: T::Real = num_traits::one();

    let mut scale = zero;
    let mut ssq = one;
    for jl in 0..local.width() {
        for il in 0..local.height() {
            let alpha = local.get(il, jl).modulus();
            if alpha != zero {
                if alpha <= scale {
                    let ratio = alpha / scale;
                    ssq = ssq + ratio * ratio;
                } else {
                    let ratio = scale / alpha;
                    ssq = one + ssq * ratio * ratio;
                    scale = alpha;
                }
            }
        }
    }

    let Some(comm) = a.grid().comm(a.dist().owner_scope()) else {
        return Ok(scale * ssq.sqrt());
    };
    let mut global_scale = [scale];
    comm.all_reduce_with(&mut global_scale, Float::max)?;
    let global_scale = global_scale[0];
    if global_scale == zero {
        return Ok(zero);
    }
    let ratio = scale / global_scale;
    let mut scaled_ssq = [if scale == zero { zero } else { ssq * ratio * ratio }];
    comm.all_reduce_sum(&mut scaled_ssq)?;
    Ok(global_scale * scaled_ssq[0].sqrt())
}

/// One-norm (equal to the infinity norm) of the Hermitian matrix whose
/// `uplo` triangle is stored in `a`. The other triangle is never read.
pub fn hermitian_one_norm<T: Scalar>(uplo: UpperOrLower, a: &DistView<'_, T>) -> Result<T::Real> {
    if a.height() != a.width() {
        return Err(DistError::nonconformal(
            "HermitianOneNorm",
            format!("{}x{} is not square", a.height(), a.width()),
        ));
    }
    let col = a.col_ownership();
    let row = a.row_ownership();
    let local = a.local();
    let mut sums = vec![<T::Real as num_traits::Zero>::zero(); a.width()];
    for jl in 0..local.width() {
        let j = row.global_index(jl);
        for il in 0..local.height() {
            let i = col.global_index(il);
            if !uplo.contains(i, j) {
                continue;
            }
            let value = local.get(il, jl).modulus();
            sums[j] += value;
            // the mirrored entry (j, i) sits in column i
            if i != j {
                sums[i] += value;
            }
        }
    }
    largest_sum(a, sums)
}

fn largest_sum<T: Scalar>(a: &DistView<'_, T>, mut sums: Vec<T::Real>) -> Result<T::Real> {
    if let Some(comm) = a.grid().comm(a.dist().owner_scope()) {
        comm.all_reduce_sum(&mut sums)?;
    }
    Ok(sums
        .into_iter()
        .fold(<T::Real as num_traits::Zero>::zero(), max))
}

fn max<R: PartialOrd>(a: R, b: R) -> R {
    if b > a {
        b
    } else {
        a
    }
}
