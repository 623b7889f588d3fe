//! cuSOLVER-Sp backend.
//!
//! Binds `cusolverSpScsrlsvqr` / `cusolverSpDcsrlsvqr`. Each call uploads
//! the CSR buffers and right-hand side, runs the solve on the context's
//! stream, and copies `x` back, which waits for the stream.

use std::sync::Arc;

use cudarc::cusolver::sys as cusolver_sys;
use cudarc::cusparse::sys as cusparse_sys;
use cudarc::driver::{CudaContext, CudaSlice, CudaStream, DevicePtr, DevicePtrMut};

use crate::error::{QrSolveError, Result};

use super::{Capabilities, CsrSystem, IndexBase, MatrixKind, Reorder, SparseQrBackend};

/// cuSOLVER-Sp handle bound to one device stream.
pub struct CudaBackend {
    handle: cusolver_sys::cusolverSpHandle_t,
    descr: cusparse_sys::cusparseMatDescr_t,
    stream: Arc<CudaStream>,
    _ctx: Arc<CudaContext>,
}

fn driver_err(e: cudarc::driver::DriverError) -> QrSolveError {
    QrSolveError::Native(format!("CUDA driver error: {e}"))
}

fn check_solver(status: cusolver_sys::cusolverStatus_t, call: &str) -> Result<()> {
    if status == cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(QrSolveError::Native(format!("{call} failed: {status:?}")))
    }
}

fn check_sparse(status: cusparse_sys::cusparseStatus_t, call: &str) -> Result<()> {
    if status == cusparse_sys::cusparseStatus_t::CUSPARSE_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(QrSolveError::Native(format!("{call} failed: {status:?}")))
    }
}

impl CudaBackend {
    /// Create a context on `device_id`, a solver handle on its default
    /// stream, and a matrix descriptor.
    pub fn new(device_id: usize) -> Result<Self> {
        let ctx = CudaContext::new(device_id).map_err(driver_err)?;
        let stream = ctx.default_stream();

        let mut handle: cusolver_sys::cusolverSpHandle_t = std::ptr::null_mut();
        check_solver(
            unsafe { cusolver_sys::cusolverSpCreate(&mut handle) },
            "cusolverSpCreate",
        )?;
        let status = unsafe { cusolver_sys::cusolverSpSetStream(handle, stream.cu_stream() as _) };
        if let Err(e) = check_solver(status, "cusolverSpSetStream") {
            unsafe { cusolver_sys::cusolverSpDestroy(handle) };
            return Err(e);
        }

        let mut descr: cusparse_sys::cusparseMatDescr_t = std::ptr::null_mut();
        let created = check_sparse(
            unsafe { cusparse_sys::cusparseCreateMatDescr(&mut descr) },
            "cusparseCreateMatDescr",
        );
        if let Err(e) = created {
            unsafe { cusolver_sys::cusolverSpDestroy(handle) };
            return Err(e);
        }

        let backend = Self {
            handle,
            descr,
            stream,
            _ctx: ctx,
        };
        backend.configure_descriptor(MatrixKind::General, IndexBase::Zero)?;
        Ok(backend)
    }

    fn configure_descriptor(&self, kind: MatrixKind, base: IndexBase) -> Result<()> {
        let kind = match kind {
            MatrixKind::General => cusparse_sys::cusparseMatrixType_t::CUSPARSE_MATRIX_TYPE_GENERAL,
        };
        let base = match base {
            IndexBase::Zero => cusparse_sys::cusparseIndexBase_t::CUSPARSE_INDEX_BASE_ZERO,
        };
        check_sparse(
            unsafe { cusparse_sys::cusparseSetMatType(self.descr, kind) },
            "cusparseSetMatType",
        )?;
        check_sparse(
            unsafe { cusparse_sys::cusparseSetMatIndexBase(self.descr, base) },
            "cusparseSetMatIndexBase",
        )
    }

    fn upload<T: cudarc::driver::DeviceRepr>(&self, data: &[T]) -> Result<CudaSlice<T>> {
        self.stream.memcpy_stod(data).map_err(driver_err)
    }
}

impl Drop for CudaBackend {
    fn drop(&mut self) {
        unsafe {
            cusparse_sys::cusparseDestroyMatDescr(self.descr);
            cusolver_sys::cusolverSpDestroy(self.handle);
        }
    }
}

macro_rules! csrlsvqr_impl {
    ($name:ident, $t:ty, $native:ident) => {
        fn $name(
            &mut self,
            system: CsrSystem<'_, $t>,
            tol: $t,
            reorder: Reorder,
            x: &mut [$t],
            singularity: &mut i32,
        ) -> Result<()> {
            self.configure_descriptor(system.descr.kind, system.descr.index_base)?;

            let d_values = self.upload(system.values)?;
            let d_row_ptr = self.upload(system.row_pointers)?;
            let d_col_ind = self.upload(system.col_indices)?;
            let d_b = self.upload(system.b)?;
            let mut d_x = self
                .stream
                .alloc_zeros::<$t>(x.len())
                .map_err(driver_err)?;

            {
                let (values_ptr, _values_guard) = d_values.device_ptr(&self.stream);
                let (row_ptr_ptr, _row_guard) = d_row_ptr.device_ptr(&self.stream);
                let (col_ind_ptr, _col_guard) = d_col_ind.device_ptr(&self.stream);
                let (b_ptr, _b_guard) = d_b.device_ptr(&self.stream);
                let (x_ptr, _x_guard) = d_x.device_ptr_mut(&self.stream);

                let status = unsafe {
                    cusolver_sys::$native(
                        self.handle,
                        system.m,
                        system.nnz,
                        self.descr as _,
                        values_ptr as *const $t,
                        row_ptr_ptr as *const i32,
                        col_ind_ptr as *const i32,
                        b_ptr as *const $t,
                        tol,
                        reorder.as_flag(),
                        x_ptr as *mut $t,
                        singularity as *mut i32,
                    )
                };
                check_solver(status, stringify!($native))?;
            }

            self.stream.memcpy_dtoh(&d_x, x).map_err(driver_err)?;
            self.stream.synchronize().map_err(driver_err)?;
            Ok(())
        }
    };
}

impl SparseQrBackend for CudaBackend {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn probe(&self) -> Capabilities {
        // A live handle means the cuSOLVER-Sp library loaded and initialized.
        Capabilities {
            sparse_qr: !self.handle.is_null(),
        }
    }

    csrlsvqr_impl!(scsrlsvqr, f32, cusolverSpScsrlsvqr);
    csrlsvqr_impl!(dcsrlsvqr, f64, cusolverSpDcsrlsvqr);
}
