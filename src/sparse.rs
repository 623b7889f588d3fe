//! Compressed Sparse Row (CSR) matrix.
//!
//! The layout handed to the native sparse QR entry points. Generic over the
//! element type so integer and half-precision matrices can be passed in and
//! promoted at solve time.

use std::borrow::Cow;
use std::ops::AddAssign;

use rayon::prelude::*;

use crate::array::DenseArray;
use crate::dtype::{DType, Element};
use crate::error::{QrSolveError, Result};

/// Sparse matrix in Compressed Sparse Row format.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    pub nrows: usize,
    pub ncols: usize,
    /// Non-zero values, stored row by row.
    pub values: Vec<T>,
    /// Column index for each non-zero value.
    pub col_indices: Vec<usize>,
    /// `row_pointers[i]` is the index into values/col_indices where row i starts.
    /// `row_pointers[nrows]` = total number of non-zeros.
    pub row_pointers: Vec<usize>,
}

impl<T: Element> CsrMatrix<T> {
    /// Build from raw CSR arrays, checking the structure.
    pub fn try_new(
        nrows: usize,
        ncols: usize,
        row_pointers: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self> {
        let m = Self {
            nrows,
            ncols,
            values,
            col_indices,
            row_pointers,
        };
        m.validate()?;
        Ok(m)
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Check the CSR invariants. Fields are public, so a matrix can be
    /// assembled by hand; the solve path calls this before marshaling.
    pub fn validate(&self) -> Result<()> {
        if self.row_pointers.len() != self.nrows + 1 {
            return Err(QrSolveError::Value(format!(
                "row_pointers has length {}, expected {}",
                self.row_pointers.len(),
                self.nrows + 1
            )));
        }
        if self.col_indices.len() != self.values.len() {
            return Err(QrSolveError::Value(format!(
                "col_indices has length {} but values has length {}",
                self.col_indices.len(),
                self.values.len()
            )));
        }
        if self.row_pointers[0] != 0 {
            return Err(QrSolveError::Value(format!(
                "row_pointers must start at 0, got {}",
                self.row_pointers[0]
            )));
        }
        if let Some(row) = self.row_pointers.windows(2).position(|w| w[0] > w[1]) {
            return Err(QrSolveError::Value(format!(
                "row_pointers decreases at row {row}"
            )));
        }
        let last = self.row_pointers[self.nrows];
        if last != self.nnz() {
            return Err(QrSolveError::Value(format!(
                "row_pointers ends at {}, expected nnz = {}",
                last,
                self.nnz()
            )));
        }
        if let Some(&col) = self.col_indices.iter().find(|&&c| c >= self.ncols) {
            return Err(QrSolveError::Value(format!(
                "column index {} out of bounds for {} columns",
                col, self.ncols
            )));
        }
        Ok(())
    }

    /// Convert a 2-D dense array, dropping zeros.
    pub fn from_dense(a: &DenseArray<T>) -> Result<Self> {
        if a.ndim() != 2 {
            return Err(QrSolveError::Shape(format!(
                "expected a 2-D array, got {} dimension(s) with shape {:?}",
                a.ndim(),
                a.shape()
            )));
        }
        let (nrows, ncols) = (a.shape()[0], a.shape()[1]);
        let data = a.as_slice();

        let mut values = Vec::new();
        let mut col_indices = Vec::new();
        let mut row_pointers = Vec::with_capacity(nrows + 1);
        row_pointers.push(0);
        for row in 0..nrows {
            for col in 0..ncols {
                let v = data[row * ncols + col];
                if !v.is_zero() {
                    values.push(v);
                    col_indices.push(col);
                }
            }
            row_pointers.push(values.len());
        }

        Ok(Self {
            nrows,
            ncols,
            values,
            col_indices,
            row_pointers,
        })
    }

    /// Same structure, values mapped through `f`.
    pub fn map_values<U>(&self, f: impl Fn(T) -> U) -> CsrMatrix<U> {
        CsrMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            values: self.values.iter().map(|&v| f(v)).collect(),
            col_indices: self.col_indices.clone(),
            row_pointers: self.row_pointers.clone(),
        }
    }

    /// Sparse matrix-vector multiply in f64: y = A * x
    pub fn spmv_f64(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.ncols {
            return Err(QrSolveError::Value(format!(
                "spmv dimension mismatch: matrix has {} columns, vector has length {}",
                self.ncols,
                x.len()
            )));
        }
        let y = (0..self.nrows)
            .into_par_iter()
            .map(|row| {
                let start = self.row_pointers[row];
                let end = self.row_pointers[row + 1];
                self.values[start..end]
                    .iter()
                    .zip(&self.col_indices[start..end])
                    .map(|(&v, &col)| v.to_f64() * x[col])
                    .sum::<f64>()
            })
            .collect();
        Ok(y)
    }
}

impl<T: Copy + Default + AddAssign> CsrMatrix<T> {
    /// Assemble from `(row, col, value)` entries in any order. Repeated
    /// positions are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Self {
        let mut sorted = triplets.to_vec();
        sorted.sort_by_key(|&(row, col, _)| (row, col));

        let mut values: Vec<T> = Vec::with_capacity(sorted.len());
        let mut col_indices = Vec::with_capacity(sorted.len());
        let mut row_counts = vec![0usize; nrows + 1];
        let mut last = None;
        for (row, col, value) in sorted {
            if last == Some((row, col)) {
                if let Some(acc) = values.last_mut() {
                    *acc += value;
                }
                continue;
            }
            values.push(value);
            col_indices.push(col);
            row_counts[row + 1] += 1;
            last = Some((row, col));
        }

        let row_pointers = row_counts
            .iter()
            .scan(0, |total, &count| {
                *total += count;
                Some(*total)
            })
            .collect();

        Self {
            nrows,
            ncols,
            values,
            col_indices,
            row_pointers,
        }
    }

    /// Row-major dense copy.
    #[cfg(test)]
    pub fn to_dense(&self) -> Vec<Vec<T>> {
        let mut dense = vec![vec![T::default(); self.ncols]; self.nrows];
        for (row, out) in dense.iter_mut().enumerate() {
            let span = self.row_pointers[row]..self.row_pointers[row + 1];
            for (&col, &value) in self.col_indices[span.clone()].iter().zip(&self.values[span]) {
                out[col] = value;
            }
        }
        dense
    }
}

/// The `A` operand of a solve: either already CSR or a dense array that
/// has to be converted first.
#[derive(Debug, Clone, Copy)]
pub enum MatrixOperand<'a, T> {
    Dense(&'a DenseArray<T>),
    Csr(&'a CsrMatrix<T>),
}

impl<'a, T: Element> MatrixOperand<'a, T> {
    /// Borrow the CSR form, converting dense input into an owned copy.
    pub fn to_csr(self) -> Result<Cow<'a, CsrMatrix<T>>> {
        match self {
            MatrixOperand::Csr(m) => Ok(Cow::Borrowed(m)),
            MatrixOperand::Dense(a) => {
                tracing::debug!(shape = ?a.shape(), "converting dense operand to CSR");
                CsrMatrix::from_dense(a).map(Cow::Owned)
            }
        }
    }
}

impl<'a, T> From<&'a DenseArray<T>> for MatrixOperand<'a, T> {
    fn from(a: &'a DenseArray<T>) -> Self {
        MatrixOperand::Dense(a)
    }
}

impl<'a, T> From<&'a CsrMatrix<T>> for MatrixOperand<'a, T> {
    fn from(m: &'a CsrMatrix<T>) -> Self {
        MatrixOperand::Csr(m)
    }
}
