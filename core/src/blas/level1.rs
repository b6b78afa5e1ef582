//! Level-1 operations on distributed matrices.
//!
//! Element-wise updates run on the local pieces only. Operations on two
//! operands need matching layouts; when they differ, the first operand is
//! redistributed to the second's layout before the local update.

use crate::dist::Layout;
use crate::dist_matrix::{DistMatrix, DistView, DistViewMut};
use crate::error::{DistError, Result};
use distla_kernels::Scalar;

/// Which triangle of a square block an operation touches. The diagonal
/// belongs to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpperOrLower {
    Lower,
    Upper,
}

impl UpperOrLower {
    pub fn contains(self, i: usize, j: usize) -> bool {
        match self {
            UpperOrLower::Lower => i >= j,
            UpperOrLower::Upper => i <= j,
        }
    }
}

pub fn zero<T: Scalar>(a: &mut DistViewMut<'_, T>) -> Result<()> {
    scale(T::zero(), a)
}

/// `A := alpha * A`. A zero `alpha` writes zeros.
pub fn scale<T: Scalar>(alpha: T, a: &mut DistViewMut<'_, T>) -> Result<()> {
    let local = a.local_mut();
    let (m, n, ld) = (local.height(), local.width(), local.ldim());
    distla_kernels::scale(m, n, alpha, local.data_mut(), ld)?;
    Ok(())
}

/// `A := alpha * A` on the entries of `uplo`, in `A`'s own coordinates.
pub fn scale_trapezoid<T: Scalar>(alpha: T, uplo: UpperOrLower, a: &mut DistViewMut<'_, T>) {
    let col = a.col_ownership();
    let row = a.row_ownership();
    let local = a.local_mut();
    for jl in 0..local.width() {
        let j = row.global_index(jl);
        for il in 0..local.height() {
            if uplo.contains(col.global_index(il), j) {
                let value = local.get(il, jl);
                local.set(il, jl, if alpha == T::zero() { T::zero() } else { alpha * value });
            }
        }
    }
}

/// `Y := alpha * X + Y`.
pub fn axpy<T: Scalar>(alpha: T, x: &DistView<'_, T>, y: &mut DistViewMut<'_, T>) -> Result<()> {
    check_same_dims("Axpy", x, y)?;
    let conformed;
    let x = if x.layout().same_alignment(y.layout()) {
        *x
    } else {
        conformed = conform(x, y.layout())?;
        conformed.as_view()
    };
    let src = x.local();
    let dst = y.local_mut();
    let (m, n, ldy) = (dst.height(), dst.width(), dst.ldim());
    distla_kernels::axpy(m, n, alpha, src.data(), src.ldim(), dst.data_mut(), ldy)?;
    Ok(())
}

/// `Y := alpha * X + Y` on the entries of `uplo` only.
pub fn axpy_triangle<T: Scalar>(
    uplo: UpperOrLower,
    alpha: T,
    x: &DistView<'_, T>,
    y: &mut DistViewMut<'_, T>,
) -> Result<()> {
    check_same_dims("AxpyTriangle", x, y)?;
    let conformed;
    let x = if x.layout().same_alignment(y.layout()) {
        *x
    } else {
        conformed = conform(x, y.layout())?;
        conformed.as_view()
    };
    let col = y.col_ownership();
    let row = y.row_ownership();
    let src = x.local();
    let dst = y.local_mut();
    for jl in 0..dst.width() {
        let j = row.global_index(jl);
        for il in 0..dst.height() {
            if uplo.contains(col.global_index(il), j) {
                dst.update(il, jl, alpha * src.get(il, jl));
            }
        }
    }
    Ok(())
}

/// `sum conj(x_ij) * y_ij` over every entry, returned on every process.
///
/// Collective over the owner communicator of `y`'s distribution.
pub fn dot<T: Scalar>(x: &DistView<'_, T>, y: &DistView<'_, T>) -> Result<T> {
    inner_product(x, y, true)
}

/// Like [`dot`] without conjugation.
pub fn dotu<T: Scalar>(x: &DistView<'_, T>, y: &DistView<'_, T>) -> Result<T> {
    inner_product(x, y, false)
}

fn inner_product<T: Scalar>(x: &DistView<'_, T>, y: &DistView<'_, T>, conjugate: bool) -> Result<T> {
    if x.height() != y.height() || x.width() != y.width() {
        return Err(DistError::nonconformal(
            "Dot",
            format!("{}x{} vs {}x{}", x.height(), x.width(), y.height(), y.width()),
        ));
    }
    let conformed;
    let x = if x.layout().same_alignment(y.layout()) {
        *x
    } else {
        conformed = conform(x, y.layout())?;
        conformed.as_view()
    };
    let (xl, yl) = (x.local(), y.local());
    let mut sum = T::zero();
    for j in 0..yl.width() {
        for i in 0..yl.height() {
            let a = if conjugate { xl.get(i, j).conj() } else { xl.get(i, j) };
            sum += a * yl.get(i, j);
        }
    }
    let mut total = [sum];
    if let Some(comm) = y.grid().comm(y.dist().owner_scope()) {
        comm.all_reduce_sum(&mut total)?;
    }
    Ok(total[0])
}

/// A copy of `src` redistributed to exactly `like`'s distribution and
/// alignments.
pub(crate) fn conform<T: Scalar>(src: &DistView<'_, T>, like: &Layout) -> Result<DistMatrix<T>> {
    let mut copy = DistMatrix::new(src.grid(), like.dist);
    copy.set_root(like.root)?;
    copy.align(like.col_align, like.row_align)?;
    copy.resize(src.height(), src.width())?;
    copy.copy_from(src)?;
    Ok(copy)
}

fn check_same_dims<T: Scalar>(op: &str, x: &DistView<'_, T>, y: &DistViewMut<'_, T>) -> Result<()> {
    if x.height() != y.height() || x.width() != y.width() {
        return Err(DistError::nonconformal(
            op,
            format!("{}x{} vs {}x{}", x.height(), x.width(), y.height(), y.width()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::DistPair;
    use crate::distributed::Universe;
    use crate::grid::Grid;
    use num_complex::Complex64;

    #[test]
    fn test_uplo_contains_diagonal() {
        assert!(UpperOrLower::Lower.contains(2, 2));
        assert!(UpperOrLower::Lower.contains(3, 1));
        assert!(!UpperOrLower::Lower.contains(1, 3));
        assert!(UpperOrLower::Upper.contains(1, 3));
    }

    #[test]
    fn test_axpy_across_distributions() {
        let results = Universe::new(4)
            .run(|world| {
                let grid = Grid::new(&world)?;
                let x = DistMatrix::from_global_fn(&grid, DistPair::VC_STAR, 5, 3, |i, j| (i + j) as f64)?;
                let mut y = DistMatrix::from_global_fn(&grid, DistPair::MC_MR, 5, 3, |i, _| i as f64)?;
                axpy(2.0, &x.as_view(), &mut y.as_view_mut())?;
                y.to_global()
            })
            .unwrap();
        for global in results {
            for i in 0..5 {
                for j in 0..3 {
                    assert_eq!(global.get(i, j), (3 * i + 2 * j) as f64);
                }
            }
        }
    }

    #[test]
    fn test_scale_trapezoid_on_window() {
        let results = Universe::new(4)
            .run(|world| {
                let grid = Grid::new(&world)?;
                let mut a = DistMatrix::from_global_fn(&grid, DistPair::MC_MR, 5, 5, |_, _| 1i64)?;
                let mut window = a.view_mut(1, 1, 4, 4)?;
                scale_trapezoid(3, UpperOrLower::Upper, &mut window);
                a.to_global()
            })
            .unwrap();
        let global = &results[0];
        assert_eq!(global.get(1, 1), 3);
        assert_eq!(global.get(1, 4), 3);
        assert_eq!(global.get(4, 1), 1);
        assert_eq!(global.get(0, 0), 1);
    }

    #[test]
    fn test_dot_conjugates_first_operand() {
        let dots = Universe::new(6)
            .run(|world| {
                let grid = Grid::new(&world)?;
                let x = DistMatrix::from_global_fn(&grid, DistPair::MC_STAR, 7, 1, |i, _| {
                    Complex64::new(i as f64, 1.0)
                })?;
                let y = DistMatrix::from_global_fn(&grid, DistPair::VR_STAR, 7, 1, |_, _| {
                    Complex64::new(0.0, 1.0)
                })?;
                Ok((dot(&x.as_view(), &y.as_view())?, dotu(&x.as_view(), &y.as_view())?))
            })
            .unwrap();
        // conj(i + 1i) * 1i = 1 + i*1i; summed over i = 0..7
        let expected_dot = Complex64::new(7.0, 21.0);
        let expected_dotu = Complex64::new(-7.0, 21.0);
        for (d, u) in dots {
            assert_eq!(d, expected_dot);
            assert_eq!(u, expected_dotu);
        }
    }

    #[test]
    fn test_axpy_nonconformal() {
        let result = Universe::new(2).run(|world| {
            let grid = Grid::new(&world)?;
            let x = DistMatrix::<f32>::zeros(&grid, DistPair::MC_MR, 2, 3)?;
            let mut y = DistMatrix::<f32>::zeros(&grid, DistPair::MC_MR, 3, 2)?;
            axpy(1.0, &x.as_view(), &mut y.as_view_mut())
        });
        assert!(matches!(result, Err(DistError::Nonconformal { .. })));
    }
}
