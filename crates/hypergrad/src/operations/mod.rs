//! Untracked tensor kernels.
//!
//! These operate on plain `DenseTensor`s. The tracked versions in
//! `autodiff::ops` call into them for the forward values.

mod elementwise;
mod linalg;

pub use elementwise::{apply, apply_binary, dot, expand, scale, sum};
pub use linalg::{as_faer_mat, matmul, transpose};
