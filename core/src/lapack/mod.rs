//! LAPACK-style reductions over distributed matrices.

pub mod norms;

pub use norms::{frobenius_norm, hermitian_one_norm, infinity_norm, max_norm, one_norm};
