//! `lsqr`: solve a square sparse system with one native QR call.
//!
//! Returns the ten-slot result of `scipy.sparse.linalg.lsqr`. The native
//! routine reports no iteration diagnostics, so only the solution and the
//! two norms are filled in.

use crate::array::{norm2, DenseArray};
use crate::dtype::{Element, Precision};
use crate::error::{QrSolveError, Result};
use crate::sparse::{CsrMatrix, MatrixOperand};

use super::{CsrSystem, MatrixDescriptor, Reorder, SolverContext, SparseQrBackend, NOT_SINGULAR};

/// `(x, istop, itn, r1norm, r2norm, anorm, acond, arnorm, xnorm, var)`
pub type LsqrTuple = (
    Vec<f64>,
    Option<i32>,
    Option<usize>,
    f64,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    f64,
    Option<Vec<f64>>,
);

/// Result of [`lsqr`], laid out like scipy's `lsqr` return value.
#[derive(Debug, Clone, PartialEq)]
pub struct LsqrResult {
    /// Solution, always in double precision.
    pub x: Vec<f64>,
    pub istop: Option<i32>,
    pub itn: Option<usize>,
    /// `‖b − A·x‖₂`
    pub r1norm: f64,
    pub r2norm: Option<f64>,
    pub anorm: Option<f64>,
    pub acond: Option<f64>,
    pub arnorm: Option<f64>,
    /// `‖x‖₂`
    pub xnorm: f64,
    pub var: Option<Vec<f64>>,
    /// First pivot index the native routine found singular.
    pub singularity: Option<usize>,
    /// Precision the native routine ran in.
    pub precision: Precision,
}

impl LsqrResult {
    pub fn is_singular(&self) -> bool {
        self.singularity.is_some()
    }

    pub fn into_tuple(self) -> LsqrTuple {
        (
            self.x,
            self.istop,
            self.itn,
            self.r1norm,
            self.r2norm,
            self.anorm,
            self.acond,
            self.arnorm,
            self.xnorm,
            self.var,
        )
    }
}

impl SolverContext {
    /// Solve `A x = b`. See [`lsqr`].
    pub fn lsqr<'a, T, U>(
        &mut self,
        a: impl Into<MatrixOperand<'a, T>>,
        b: &DenseArray<U>,
    ) -> Result<LsqrResult>
    where
        T: Element,
        U: Element,
    {
        lsqr(self, a, b)
    }
}

/// Solve the square sparse system `A x = b` by QR factorization.
///
/// `A` may be CSR or a dense 2-D array (converted to CSR first). Matrices
/// of `f32`/`f64` are solved in their own precision; other element types
/// are promoted together with `f32`. `b` is cast to the same precision.
///
/// Fails with `Unsupported` when the context has no sparse QR capability
/// (before touching the inputs), `Shape` when `A` is not a square matrix,
/// and `Value` when `b` is not 1-D of length `m`. A singular system does
/// not fail; it is reported through [`LsqrResult::singularity`].
pub fn lsqr<'a, T, U>(
    ctx: &mut SolverContext,
    a: impl Into<MatrixOperand<'a, T>>,
    b: &DenseArray<U>,
) -> Result<LsqrResult>
where
    T: Element,
    U: Element,
{
    if !ctx.is_supported() {
        return Err(QrSolveError::Unsupported(format!(
            "backend '{}' does not provide sparse QR (csrlsvqr)",
            ctx.backend_name()
        )));
    }

    let operand: MatrixOperand<'a, T> = a.into();
    let a = operand.to_csr()?;
    if a.nrows != a.ncols {
        return Err(QrSolveError::Shape(format!(
            "expected a square matrix, got {}x{}",
            a.nrows, a.ncols
        )));
    }
    let m = a.nrows;
    if b.ndim() != 1 || b.len() != m {
        return Err(QrSolveError::Value(format!(
            "b must be a 1-D array of length {}, got shape {:?}",
            m,
            b.shape()
        )));
    }
    a.validate()?;
    let options = *ctx.options();
    options.validate()?;

    let precision = Precision::for_dtype(T::DTYPE);
    let dtype = a.dtype();
    let max_abs = a.values.iter().map(|v| v.to_f64().abs()).fold(0.0, f64::max);
    let tol = options.resolve_tol(precision, m, max_abs);
    let _span = tracing::info_span!("lsqr", m, nnz = a.nnz(), %precision).entered();
    tracing::debug!(
        backend = ctx.backend_name(),
        %dtype,
        b_dtype = %b.dtype(),
        reorder = ?options.reorder,
        tol,
        derived_tol = options.tol.is_none(),
        "dispatching csrlsvqr"
    );

    let (x, singularity) = match precision {
        Precision::Single => solve_in::<f32, T, U>(ctx, &a, b, tol, options.reorder)?,
        Precision::Double => solve_in::<f64, T, U>(ctx, &a, b, tol, options.reorder)?,
    };

    let singularity = if singularity < 0 {
        None
    } else {
        tracing::warn!(index = singularity, "native solver reported a singular pivot");
        Some(singularity as usize)
    };

    let ax = a.spmv_f64(&x)?;
    let residual: Vec<f64> = b
        .to_f64_vec()
        .into_iter()
        .zip(&ax)
        .map(|(bi, &axi)| bi - axi)
        .collect();
    let r1norm = norm2(&residual);
    let xnorm = norm2(&x);
    tracing::debug!(r1norm, xnorm, "lsqr finished");

    Ok(LsqrResult {
        x,
        istop: None,
        itn: None,
        r1norm,
        r2norm: None,
        anorm: None,
        acond: None,
        arnorm: None,
        xnorm,
        var: None,
        singularity,
        precision,
    })
}

/// Working precision of a native entry point.
trait NativeFloat: Copy + Default {
    fn from_f64(v: f64) -> Self;

    fn widen(self) -> f64;

    fn csrlsvqr(
        backend: &mut dyn SparseQrBackend,
        system: CsrSystem<'_, Self>,
        tol: Self,
        reorder: Reorder,
        x: &mut [Self],
        singularity: &mut i32,
    ) -> Result<()>;
}

impl NativeFloat for f32 {
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn widen(self) -> f64 {
        self as f64
    }

    fn csrlsvqr(
        backend: &mut dyn SparseQrBackend,
        system: CsrSystem<'_, f32>,
        tol: f32,
        reorder: Reorder,
        x: &mut [f32],
        singularity: &mut i32,
    ) -> Result<()> {
        backend.scsrlsvqr(system, tol, reorder, x, singularity)
    }
}

impl NativeFloat for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }

    fn widen(self) -> f64 {
        self
    }

    fn csrlsvqr(
        backend: &mut dyn SparseQrBackend,
        system: CsrSystem<'_, f64>,
        tol: f64,
        reorder: Reorder,
        x: &mut [f64],
        singularity: &mut i32,
    ) -> Result<()> {
        backend.dcsrlsvqr(system, tol, reorder, x, singularity)
    }
}

fn solve_in<F, T, U>(
    ctx: &mut SolverContext,
    a: &CsrMatrix<T>,
    b: &DenseArray<U>,
    tol: f64,
    reorder: Reorder,
) -> Result<(Vec<f64>, i32)>
where
    F: NativeFloat,
    T: Element,
    U: Element,
{
    let (row_pointers, col_indices) = native_indices(a)?;
    let values: Vec<F> = a.values.iter().map(|&v| F::from_f64(v.to_f64())).collect();
    let rhs: Vec<F> = b.as_slice().iter().map(|&v| F::from_f64(v.to_f64())).collect();
    let descr = MatrixDescriptor::default();
    let system = CsrSystem {
        m: to_native_index(a.nrows, "dimension")?,
        nnz: to_native_index(a.nnz(), "nonzero count")?,
        descr: &descr,
        values: &values,
        row_pointers: &row_pointers,
        col_indices: &col_indices,
        b: &rhs,
    };

    let mut x: Vec<F> = ctx.allocate(a.nrows);
    let mut singularity = NOT_SINGULAR;
    F::csrlsvqr(
        ctx.backend_mut(),
        system,
        F::from_f64(tol),
        reorder,
        &mut x,
        &mut singularity,
    )?;

    Ok((x.into_iter().map(NativeFloat::widen).collect(), singularity))
}

fn native_indices<T>(a: &CsrMatrix<T>) -> Result<(Vec<i32>, Vec<i32>)> {
    let row_pointers = a
        .row_pointers
        .iter()
        .map(|&p| to_native_index(p, "row pointer"))
        .collect::<Result<Vec<_>>>()?;
    let col_indices = a
        .col_indices
        .iter()
        .map(|&c| to_native_index(c, "column index"))
        .collect::<Result<Vec<_>>>()?;
    Ok((row_pointers, col_indices))
}

fn to_native_index(v: usize, what: &str) -> Result<i32> {
    i32::try_from(v).map_err(|_| {
        QrSolveError::Value(format!("{what} {v} does not fit a 32-bit native index"))
    })
}
