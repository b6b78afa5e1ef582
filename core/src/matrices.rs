//! Constructors for commonly used distributed matrices.
//!
//! None of these communicate: each process fills in the entries it holds from
//! their global coordinates.

use crate::dist::DistPair;
use crate::dist_matrix::DistMatrix;
use crate::error::Result;
use crate::grid::Grid;
use distla_kernels::Scalar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// The `n x n` identity.
pub fn identity<T: Scalar>(grid: &Arc<Grid>, dist: DistPair, n: usize) -> Result<DistMatrix<T>> {
    DistMatrix::from_global_fn(grid, dist, n, n, |i, j| if i == j { T::one() } else { T::zero() })
}

/// A square matrix with `d` on its diagonal and zeros elsewhere.
pub fn diagonal<T: Scalar>(grid: &Arc<Grid>, dist: DistPair, d: &[T]) -> Result<DistMatrix<T>> {
    let n = d.len();
    DistMatrix::from_global_fn(grid, dist, n, n, |i, j| if i == j { d[i] } else { T::zero() })
}

/// An `m x n` matrix whose entries are drawn from `center` plus a uniform
/// sample of `[-radius, radius)` (independently in the real and imaginary
/// parts for complex types).
///
/// Entry `(i, j)` depends only on `(seed, i, j)`, so every copy of a
/// replicated entry agrees and the result does not depend on the
/// distribution or grid shape.
pub fn uniform<T: Scalar>(
    grid: &Arc<Grid>,
    dist: DistPair,
    m: usize,
    n: usize,
    center: T,
    radius: f64,
    seed: u64,
) -> Result<DistMatrix<T>> {
    DistMatrix::from_global_fn(grid, dist, m, n, |i, j| {
        let mut rng = StdRng::seed_from_u64(entry_seed(seed, i, j));
        let re = (2.0 * rng.random::<f64>() - 1.0) * radius;
        let im = (2.0 * rng.random::<f64>() - 1.0) * radius;
        center + T::from_parts(re, im)
    })
}

// splitmix64 finalizer over the seed and both coordinates
fn entry_seed(seed: u64, i: usize, j: usize) -> u64 {
    let mix = |mut z: u64| {
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    };
    let z = mix(seed.wrapping_add(0x9e37_79b9_7f4a_7c15));
    let z = mix(z ^ i as u64);
    mix(z ^ (j as u64).rotate_left(32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::Universe;
    use num_complex::Complex64;

    #[test]
    fn test_identity_and_diagonal() {
        let results = Universe::new(4)
            .run(|world| {
                let grid = Grid::new(&world)?;
                let eye = identity::<i64>(&grid, DistPair::MR_MC, 5)?.to_global()?;
                let d = diagonal(&grid, DistPair::VC_STAR, &[1i64, 2, 3])?.to_global()?;
                Ok((eye, d))
            })
            .unwrap();
        for (eye, d) in results {
            for i in 0..5 {
                for j in 0..5 {
                    assert_eq!(eye.get(i, j), i64::from(i == j));
                }
            }
            assert_eq!(d.get(1, 1), 2);
            assert_eq!(d.get(2, 0), 0);
            assert_eq!(d.dims(), (3, 3));
        }
    }

    #[test]
    fn test_uniform_independent_of_distribution() {
        let results = Universe::new(6)
            .run(|world| {
                let grid = Grid::new(&world)?;
                let a = uniform(&grid, DistPair::MC_MR, 6, 4, Complex64::new(1.0, 0.0), 0.5, 42)?;
                let b = uniform(&grid, DistPair::STAR_VR, 6, 4, Complex64::new(1.0, 0.0), 0.5, 42)?;
                Ok((a.to_global()?, b.to_global()?))
            })
            .unwrap();
        for (a, b) in &results {
            assert_eq!(a, b);
            for i in 0..6 {
                for j in 0..4 {
                    let z = a.get(i, j);
                    assert!((0.5..1.5).contains(&z.re));
                    assert!((-0.5..0.5).contains(&z.im));
                }
            }
        }
        assert_ne!(results[0].0.get(0, 0), results[0].0.get(0, 1));
    }
}
