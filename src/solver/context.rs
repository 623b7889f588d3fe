//! Solver context: the native handle, its probed capabilities, and options.

use crate::dtype::Precision;
use crate::error::{QrSolveError, Result};

use super::host::HostBackend;
use super::{Reorder, SparseQrBackend, UnavailableBackend};

/// Capabilities a backend reported when the context was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Sparse QR direct solve (`csrlsvqr`) is usable.
    pub sparse_qr: bool,
}

/// Per-context solve options.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolveOptions {
    /// Pivots with `|R(j,j)| <= tol` are reported through the singularity
    /// flag. `None` derives the threshold from the solve precision.
    pub tol: Option<f64>,
    pub reorder: Reorder,
}

impl SolveOptions {
    /// Scale of the derived tolerance `TOLERANCE_SCALE * n * eps * max|A|`.
    pub const TOLERANCE_SCALE: f64 = 10.0;

    /// The tolerance hard-coded by cupy's `lsqr`. Coarse enough to flag
    /// well-conditioned matrices with unit-scale pivots as singular.
    pub const LEGACY_TOLERANCE: f64 = 1.0;

    pub fn legacy() -> Self {
        Self {
            tol: Some(Self::LEGACY_TOLERANCE),
            reorder: Reorder::Symrcm,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.tol {
            Some(tol) if !tol.is_finite() || tol < 0.0 => Err(QrSolveError::Value(format!(
                "tolerance must be finite and non-negative, got {tol}"
            ))),
            _ => Ok(()),
        }
    }

    /// Threshold for an `n x n` system whose largest entry is `max_abs`,
    /// solved in `precision`.
    pub fn resolve_tol(&self, precision: Precision, n: usize, max_abs: f64) -> f64 {
        self.tol.unwrap_or_else(|| {
            Self::TOLERANCE_SCALE * n.max(1) as f64 * precision.epsilon() * max_abs
        })
    }
}

/// An initialized connection to a sparse QR backend.
///
/// Created once and passed to every solve. Solves borrow it mutably, so a
/// context serves one call at a time.
pub struct SolverContext {
    backend: Box<dyn SparseQrBackend>,
    capabilities: Capabilities,
    options: SolveOptions,
    allocations: usize,
    native_calls: usize,
}

impl SolverContext {
    /// Wrap `backend`, probing its capabilities once.
    pub fn with_backend(backend: Box<dyn SparseQrBackend>) -> Self {
        let capabilities = backend.probe();
        tracing::info!(
            backend = backend.name(),
            sparse_qr = capabilities.sparse_qr,
            "solver context created"
        );
        Self {
            backend,
            capabilities,
            options: SolveOptions::default(),
            allocations: 0,
            native_calls: 0,
        }
    }

    /// Context on the CPU backend.
    pub fn host() -> Self {
        Self::with_backend(Box::new(HostBackend::new()))
    }

    /// Context that refuses every solve with an Unsupported error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::with_backend(Box::new(UnavailableBackend::new(reason)))
    }

    /// Context on CUDA device `device_id` via cuSOLVER-Sp.
    #[cfg(feature = "cuda")]
    pub fn cuda(device_id: usize) -> Result<Self> {
        let backend = super::cuda::CudaBackend::new(device_id)?;
        Ok(Self::with_backend(Box::new(backend)))
    }

    pub fn with_options(mut self, options: SolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SolveOptions) {
        self.options = options;
    }

    pub fn is_supported(&self) -> bool {
        self.capabilities.sparse_qr
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Output buffers allocated by solves on this context.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Native entry-point invocations made on this context.
    pub fn native_calls(&self) -> usize {
        self.native_calls
    }

    pub(crate) fn allocate<F: Copy + Default>(&mut self, len: usize) -> Vec<F> {
        self.allocations += 1;
        vec![F::default(); len]
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn SparseQrBackend {
        self.native_calls += 1;
        self.backend.as_mut()
    }
}

impl std::fmt::Debug for SolverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverContext")
            .field("backend", &self.backend.name())
            .field("capabilities", &self.capabilities)
            .field("options", &self.options)
            .field("allocations", &self.allocations)
            .field("native_calls", &self.native_calls)
            .finish()
    }
}
