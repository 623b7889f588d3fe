//! Sparse QR direct solve.
//!
//! `SparseQrBackend` is the native boundary: precision-specialized
//! `csrlsvqr` entry points that factor and solve a square CSR system in one
//! call. The shim in [`lsqr`] validates and marshals inputs for it; the
//! backends in [`host`] and [`cuda`] implement it.

pub mod context;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod host;
pub mod lsqr;
pub mod ordering;

pub use context::{Capabilities, SolveOptions, SolverContext};
pub use lsqr::{lsqr, LsqrResult};

use crate::error::Result;

/// Sentinel written to the singularity output when no singular pivot was found.
pub const NOT_SINGULAR: i32 = -1;

/// Fill-reducing reordering applied by the native routine before factoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reorder {
    None,
    /// Symmetric reverse Cuthill-McKee.
    #[default]
    Symrcm,
}

impl Reorder {
    /// Flag value understood by `csrlsvqr`.
    pub fn as_flag(self) -> i32 {
        match self {
            Reorder::None => 0,
            Reorder::Symrcm => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixKind {
    #[default]
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBase {
    #[default]
    Zero,
}

/// Structural descriptor of the matrix handed to the native routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatrixDescriptor {
    pub kind: MatrixKind,
    pub index_base: IndexBase,
}

/// Borrowed, marshaled square CSR system in native layout.
#[derive(Debug, Clone, Copy)]
pub struct CsrSystem<'a, F> {
    pub m: i32,
    pub nnz: i32,
    pub descr: &'a MatrixDescriptor,
    pub values: &'a [F],
    pub row_pointers: &'a [i32],
    pub col_indices: &'a [i32],
    pub b: &'a [F],
}

/// Native sparse-direct-solver entry points.
///
/// Implementations factor `A` with QR (after the requested reordering),
/// solve for `x`, and write the first index whose `|R(j,j)| <= tol` into
/// `singularity`, or [`NOT_SINGULAR`].
pub trait SparseQrBackend {
    fn name(&self) -> &'static str;

    /// Report which capabilities this backend has in the current build
    /// and runtime. Called once, when a context is created.
    fn probe(&self) -> Capabilities;

    /// Single-precision `csrlsvqr`.
    fn scsrlsvqr(
        &mut self,
        system: CsrSystem<'_, f32>,
        tol: f32,
        reorder: Reorder,
        x: &mut [f32],
        singularity: &mut i32,
    ) -> Result<()>;

    /// Double-precision `csrlsvqr`.
    fn dcsrlsvqr(
        &mut self,
        system: CsrSystem<'_, f64>,
        tol: f64,
        reorder: Reorder,
        x: &mut [f64],
        singularity: &mut i32,
    ) -> Result<()>;
}

/// Backend for builds or machines without sparse QR support.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn refuse(&self) -> Result<()> {
        Err(crate::error::QrSolveError::Unsupported(self.reason.clone()))
    }
}

impl SparseQrBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn probe(&self) -> Capabilities {
        Capabilities { sparse_qr: false }
    }

    fn scsrlsvqr(
        &mut self,
        _system: CsrSystem<'_, f32>,
        _tol: f32,
        _reorder: Reorder,
        _x: &mut [f32],
        _singularity: &mut i32,
    ) -> Result<()> {
        self.refuse()
    }

    fn dcsrlsvqr(
        &mut self,
        _system: CsrSystem<'_, f64>,
        _tol: f64,
        _reorder: Reorder,
        _x: &mut [f64],
        _singularity: &mut i32,
    ) -> Result<()> {
        self.refuse()
    }
}
