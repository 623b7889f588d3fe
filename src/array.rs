//! Dense host arrays.
//!
//! Row-major n-dimensional buffer used for dense matrix operands and for
//! right-hand side vectors.

use crate::dtype::{DType, Element};
use crate::error::{QrSolveError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DenseArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Element> DenseArray<T> {
    /// One-dimensional array owning `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Array of the given shape over row-major `data`.
    pub fn from_shape_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(QrSolveError::Shape(format!(
                "shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Two-dimensional array from equal-length rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(nrows * ncols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(QrSolveError::Shape(format!(
                    "ragged rows: row 0 has {} columns, row {} has {}",
                    ncols,
                    i,
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            shape: vec![nrows, ncols],
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Element-wise conversion to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.iter().map(|&v| v.to_f64()).collect()
    }
}

impl<T: Element> From<Vec<T>> for DenseArray<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

/// Euclidean norm.
pub fn norm2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
