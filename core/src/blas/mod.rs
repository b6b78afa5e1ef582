//! Distributed BLAS: element-wise level-1 helpers and the SUMMA-based
//! level-3 products.

pub mod level1;
pub mod level3;

pub use level1::{axpy, axpy_triangle, dot, dotu, scale, scale_trapezoid, zero, UpperOrLower};
pub use level3::{gemm, gemm_new, local_gemm, local_trr2k, trr2k, GemmAlgorithm};
