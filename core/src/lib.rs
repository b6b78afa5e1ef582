//! # distla
//!
//! `distla` stores dense matrices spread over a two-dimensional grid of
//! processes and runs the classic distributed algorithms on them: moving a
//! matrix between distributions and multiplying matrices with the SUMMA
//! family of algorithms.
//!
//! Everything runs SPMD-style. Each rank calls the same functions with its own
//! piece of every matrix; the functions are collective and communicate through
//! the [`distributed`] layer. The in-process [`Universe`] spawns one thread per
//! rank, which is what the tests and benchmarks use.
//!
//! ## Modules
//!
//! - [`distributed`]: communicators, collectives and the in-process universe.
//! - [`grid`]: the `r x c` process grid and its row, column and diagonal
//!   communicators.
//! - [`dist`]: the element-cyclic distributions (`MC`, `MR`, `VC`, `VR`, `*`,
//!   `o`) and per-process layouts.
//! - [`dist_matrix`]: [`DistMatrix`] and borrowed windows into it.
//! - [`redist`]: the redistribution engine behind [`DistMatrix::copy_from`].
//! - [`blas`]: level-1 helpers, [`gemm`](blas::gemm) and
//!   [`trr2k`](blas::trr2k).
//! - [`lapack`]: matrix norms.
//! - [`matrices`]: identity, diagonal and random matrices.
//!
//! ## Example
//!
//! ```rust
//! use distla::blas::{self, GemmAlgorithm};
//! use distla::{DistMatrix, DistPair, Grid, Orientation, Universe};
//!
//! let products = Universe::new(4)
//!     .run(|world| {
//!         let grid = Grid::new(&world)?;
//!         let a = DistMatrix::from_global_fn(&grid, DistPair::MC_MR, 4, 3, |i, j| (i + j) as f64)?;
//!         let b = DistMatrix::from_global_fn(&grid, DistPair::STAR_VR, 3, 2, |i, _| i as f64)?;
//!         let (normal, alg) = (Orientation::Normal, GemmAlgorithm::Default);
//!         let c = blas::gemm_new(normal, normal, 1.0, &a.as_view(), &b.as_view(), alg)?;
//!         c.to_global()
//!     })
//!     .unwrap();
//! assert_eq!(products[0].get(0, 0), 5.0);
//! ```

pub mod blas;
pub mod config;
pub mod dist;
pub mod dist_matrix;
pub mod distributed;
pub mod error;
pub mod grid;
pub mod lapack;
pub mod matrices;
pub mod matrix;
pub mod redist;

pub use blas::UpperOrLower;
pub use config::{Config, LocalKernel};
pub use dist::{Dist, DistPair, Layout};
pub use dist_matrix::{DistMatrix, DistView, DistViewMut};
pub use distla_kernels::{Orientation, Scalar};
pub use distributed::{Comm, Universe};
pub use error::{DistError, Result};
pub use grid::{Grid, GridOrder, GridShape, Position, Scope};
pub use matrix::{Matrix, MatrixView, MatrixViewMut};
pub use redist::redistribute;
