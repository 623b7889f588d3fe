//! Sparse QR direct solve of square systems `Ax = b`.
//!
//! A [`SolverContext`](solver::SolverContext) wraps a native `csrlsvqr`
//! backend (cuSOLVER-Sp with the `cuda` feature, or the host backend), and
//! [`lsqr`](solver::lsqr()) marshals a CSR or dense matrix and a vector into
//! one call, returning an lsqr-shaped result.

pub mod array;
pub mod dtype;
pub mod error;
pub mod output;
pub mod parser;
pub mod solver;
pub mod sparse;
pub mod stats;

pub use array::DenseArray;
pub use dtype::{promote, DType, Element, Precision};
pub use error::{QrSolveError, Result};
pub use solver::{lsqr, LsqrResult, SolveOptions, SolverContext};
pub use sparse::{CsrMatrix, MatrixOperand};
