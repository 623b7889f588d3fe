//! Host `csrlsvqr` backend.
//!
//! Applies the requested reordering, assembles `[P A Pᵀ | P b]` as a faer
//! sparse matrix and factors it with faer's QR. The last column of R then
//! holds `Qᵀ P b`, so the solve is one back substitution on R. The
//! factorization runs on a dense copy; large systems belong on the CUDA
//! backend.

use std::ops::{Div, Mul, Sub};

use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;

use crate::error::{QrSolveError, Result};

use super::ordering;
use super::{Capabilities, CsrSystem, Reorder, SparseQrBackend, NOT_SINGULAR};

/// Working precision of the host factorization.
pub trait HostReal:
    Copy + PartialOrd + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self>
{
    fn zero() -> Self;
    fn abs(self) -> Self;
    fn is_finite(self) -> bool;

    /// Upper-trapezoidal R of the QR factorization of `a`, lower part zeroed.
    fn qr_r_factor(a: &SparseColMat<usize, Self>) -> Mat<Self>;
}

macro_rules! impl_host_real {
    ($t:ty) => {
        impl HostReal for $t {
            fn zero() -> Self {
                0.0
            }

            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }

            fn qr_r_factor(a: &SparseColMat<usize, Self>) -> Mat<Self> {
                let dense = a.as_ref().to_dense();
                let qr = dense.as_ref().qr();
                let r = qr.R();
                Mat::from_fn(r.nrows(), r.ncols(), |i, j| if i <= j { r[(i, j)] } else { 0.0 })
            }
        }
    };
}

impl_host_real!(f32);
impl_host_real!(f64);

/// CPU implementation of the sparse QR entry points.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostBackend;

impl HostBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SparseQrBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn probe(&self) -> Capabilities {
        Capabilities { sparse_qr: true }
    }

    fn scsrlsvqr(
        &mut self,
        system: CsrSystem<'_, f32>,
        tol: f32,
        reorder: Reorder,
        x: &mut [f32],
        singularity: &mut i32,
    ) -> Result<()> {
        csrlsvqr(system, tol, reorder, x, singularity)
    }

    fn dcsrlsvqr(
        &mut self,
        system: CsrSystem<'_, f64>,
        tol: f64,
        reorder: Reorder,
        x: &mut [f64],
        singularity: &mut i32,
    ) -> Result<()> {
        csrlsvqr(system, tol, reorder, x, singularity)
    }
}

fn csrlsvqr<F: HostReal + faer::traits::ComplexField>(
    system: CsrSystem<'_, F>,
    tol: F,
    reorder: Reorder,
    x: &mut [F],
    singularity: &mut i32,
) -> Result<()> {
    let n = check_system(&system, x.len())?;
    if n == 0 {
        *singularity = NOT_SINGULAR;
        return Ok(());
    }

    let perm: Vec<usize> = match reorder {
        Reorder::None => (0..n).collect(),
        Reorder::Symrcm => ordering::symrcm(n, system.row_pointers, system.col_indices),
    };
    let inv = ordering::invert(&perm);

    let mut triplets = Vec::with_capacity(system.values.len() + n);
    for row in 0..n {
        let start = system.row_pointers[row] as usize;
        let end = system.row_pointers[row + 1] as usize;
        for idx in start..end {
            let val = system.values[idx];
            if !val.is_finite() {
                return Err(QrSolveError::Native("matrix contains NaN/Inf".into()));
            }
            let col = system.col_indices[idx] as usize;
            triplets.push(Triplet::new(inv[row], inv[col], val));
        }
    }
    for (k, &p) in perm.iter().enumerate() {
        let val = system.b[p];
        if !val.is_finite() {
            return Err(QrSolveError::Native("right-hand side contains NaN/Inf".into()));
        }
        triplets.push(Triplet::new(k, n, val));
    }

    let augmented = SparseColMat::<usize, F>::try_new_from_triplets(n, n + 1, &triplets)
        .map_err(|e| QrSolveError::Native(format!("sparse matrix build failed: {e:?}")))?;
    let r = F::qr_r_factor(&augmented);

    *singularity = (0..n)
        .find(|&j| r[(j, j)].abs() <= tol)
        .map_or(NOT_SINGULAR, |j| j as i32);
    if *singularity != NOT_SINGULAR {
        tracing::debug!(index = *singularity, "host QR found a small pivot");
    }

    // R y = Qᵀ P b, with Qᵀ P b in column n of the augmented factor.
    let mut y = vec![F::zero(); n];
    for j in (0..n).rev() {
        let mut sum = r[(j, n)];
        for k in (j + 1)..n {
            sum = sum - r[(j, k)] * y[k];
        }
        let pivot = r[(j, j)];
        y[j] = if pivot == F::zero() { F::zero() } else { sum / pivot };
    }

    for (k, &p) in perm.iter().enumerate() {
        x[p] = y[k];
    }
    Ok(())
}

fn check_system<F>(system: &CsrSystem<'_, F>, x_len: usize) -> Result<usize> {
    if system.m < 0 || system.nnz < 0 {
        return Err(QrSolveError::Native(format!(
            "negative dimension: m = {}, nnz = {}",
            system.m, system.nnz
        )));
    }
    let n = system.m as usize;
    let nnz = system.nnz as usize;
    if system.row_pointers.len() != n + 1
        || system.col_indices.len() != nnz
        || system.values.len() != nnz
        || system.b.len() != n
        || x_len != n
    {
        return Err(QrSolveError::Native(format!(
            "buffer sizes do not match m = {n}, nnz = {nnz}"
        )));
    }
    if system.row_pointers[0] != 0
        || system.row_pointers[n] as usize != nnz
        || system.row_pointers.windows(2).any(|w| w[0] > w[1])
    {
        return Err(QrSolveError::Native("row pointers are not monotone".into()));
    }
    if system
        .col_indices
        .iter()
        .any(|&c| c < 0 || c as usize >= n)
    {
        return Err(QrSolveError::Native("column index out of range".into()));
    }
    Ok(n)
}
