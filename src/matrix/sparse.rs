// SparseMatrix trait and the CSR implementation

use std::collections::BTreeMap;
use std::ops::Range;

use faer::Mat;
use num_traits::Float;

use crate::core::traits::{Indexing, MatVec, MatrixGet, RowPattern};
use crate::error::KError;
use crate::matrix::layout::Layout;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A read‐only sparse matrix supporting y = A * x.
pub trait SparseMatrix<T> {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    fn spmv(&self, x: &[T], y: &mut [T]);
}

/// Compressed sparse row matrix.
///
/// Column indices are strictly increasing inside every row.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix<T> {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

/// Collects the entries of one row with INSERT semantics: setting a column
/// twice keeps the last value.
#[derive(Debug)]
pub struct RowInserter<T> {
    ncols: usize,
    entries: BTreeMap<usize, T>,
}

impl<T: Copy> RowInserter<T> {
    fn new(ncols: usize) -> Self {
        Self { ncols, entries: BTreeMap::new() }
    }

    pub fn set(&mut self, col: usize, value: T) -> Result<(), KError> {
        if col >= self.ncols {
            return Err(KError::OutOfRange { index: col, bound: self.ncols });
        }
        self.entries.insert(col, value);
        Ok(())
    }

    pub fn set_values(&mut self, cols: &[usize], values: &[T]) -> Result<(), KError> {
        if cols.len() != values.len() {
            return Err(KError::DimensionMismatch(format!(
                "{} column indices for {} values",
                cols.len(),
                values.len()
            )));
        }
        for (&c, &v) in cols.iter().zip(values) {
            self.set(c, v)?;
        }
        Ok(())
    }
}

/// Rows assembled by one ownership range.
struct LocalRows<T> {
    lengths: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: Float + Send + Sync> CsrMatrix<T> {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, KError> {
        if row_ptr.len() != nrows + 1 {
            return Err(KError::DimensionMismatch(format!(
                "row_ptr has {} entries, expected {}",
                row_ptr.len(),
                nrows + 1
            )));
        }
        if col_idx.len() != values.len() {
            return Err(KError::DimensionMismatch(format!(
                "{} column indices for {} values",
                col_idx.len(),
                values.len()
            )));
        }
        if row_ptr[0] != 0 || row_ptr[nrows] != values.len() {
            return Err(KError::InvalidArgument("row_ptr must span 0..nnz".into()));
        }
        for i in 0..nrows {
            if row_ptr[i] > row_ptr[i + 1] {
                return Err(KError::InvalidArgument(format!("row_ptr decreases at row {i}")));
            }
            let cols = &col_idx[row_ptr[i]..row_ptr[i + 1]];
            if let Some(&c) = cols.iter().find(|&&c| c >= ncols) {
                return Err(KError::OutOfRange { index: c, bound: ncols });
            }
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(KError::InvalidArgument(format!(
                    "column indices of row {i} are not strictly increasing"
                )));
            }
        }
        Ok(Self { nrows, ncols, row_ptr, col_idx, values })
    }

    /// Assemble a matrix row by row.
    ///
    /// Every part of `layout` fills the rows in its ownership range through
    /// `fill(row, inserter)`; parts run in parallel under the `rayon` feature.
    pub fn from_rows<F>(nrows: usize, ncols: usize, layout: &Layout, fill: F) -> Result<Self, KError>
    where
        F: Fn(usize, &mut RowInserter<T>) -> Result<(), KError> + Sync,
    {
        if layout.size() != nrows {
            return Err(KError::DimensionMismatch(format!(
                "layout covers {} rows, matrix has {nrows}",
                layout.size()
            )));
        }
        let assemble_part = |range: Range<usize>| -> Result<LocalRows<T>, KError> {
            let mut local = LocalRows {
                lengths: Vec::with_capacity(range.len()),
                col_idx: Vec::new(),
                values: Vec::new(),
            };
            for row in range {
                let mut inserter = RowInserter::new(ncols);
                fill(row, &mut inserter)?;
                local.lengths.push(inserter.entries.len());
                for (c, v) in inserter.entries {
                    local.col_idx.push(c);
                    local.values.push(v);
                }
            }
            Ok(local)
        };

        let ranges: Vec<Range<usize>> = layout.ranges().collect();
        #[cfg(feature = "rayon")]
        let parts: Vec<LocalRows<T>> = ranges
            .into_par_iter()
            .map(assemble_part)
            .collect::<Result<_, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let parts: Vec<LocalRows<T>> = ranges
            .into_iter()
            .map(assemble_part)
            .collect::<Result<_, _>>()?;

        let nnz = parts.iter().map(|p| p.values.len()).sum();
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_ptr.push(0);
        for part in parts {
            for len in part.lengths {
                let last = row_ptr[row_ptr.len() - 1];
                row_ptr.push(last + len);
            }
            col_idx.extend(part.col_idx);
            values.extend(part.values);
        }
        Ok(Self { nrows, ncols, row_ptr, col_idx, values })
    }

    /// `n × n` identity.
    pub fn identity(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: vec![T::one(); n],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Main diagonal; missing entries are zero.
    pub fn diagonal(&self) -> Vec<T> {
        (0..self.nrows.min(self.ncols)).map(|i| self.get(i, i)).collect()
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> Result<(&[usize], &[T]), KError> {
        if i >= self.nrows {
            return Err(KError::OutOfRange { index: i, bound: self.nrows });
        }
        let span = self.row_ptr[i]..self.row_ptr[i + 1];
        Ok((&self.col_idx[span.clone()], &self.values[span]))
    }

    /// Square diagonal block `range × range`, re-indexed from zero.
    pub fn submatrix(&self, range: Range<usize>) -> Result<Self, KError> {
        if range.end > self.nrows || range.end > self.ncols || range.start > range.end {
            return Err(KError::OutOfRange { index: range.end, bound: self.nrows.min(self.ncols) });
        }
        let mut row_ptr = Vec::with_capacity(range.len() + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for i in range.clone() {
            let span = self.row_ptr[i]..self.row_ptr[i + 1];
            for (&j, &v) in self.col_idx[span.clone()].iter().zip(&self.values[span]) {
                if range.contains(&j) {
                    col_idx.push(j - range.start);
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }
        Ok(Self { nrows: range.len(), ncols: range.len(), row_ptr, col_idx, values })
    }

    fn row_dot(&self, i: usize, x: &[T]) -> T {
        let span = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[span.clone()]
            .iter()
            .zip(&self.values[span])
            .fold(T::zero(), |acc, (&j, &v)| acc + v * x[j])
    }
}

impl CsrMatrix<f64> {
    /// Dense copy, for inspection and reference computations.
    pub fn to_dense(&self) -> Mat<f64> {
        Mat::from_fn(self.nrows, self.ncols, |i, j| self.get(i, j))
    }
}

impl<T: Float + Send + Sync> SparseMatrix<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows
    }
    fn ncols(&self) -> usize {
        self.ncols
    }
    fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols, "Input vector x has incorrect length");
        assert_eq!(y.len(), self.nrows, "Output vector y has incorrect length");
        #[cfg(feature = "rayon")]
        y.par_iter_mut()
            .enumerate()
            .for_each(|(i, yi)| *yi = self.row_dot(i, x));
        #[cfg(not(feature = "rayon"))]
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row_dot(i, x);
        }
    }
}

impl<T: Float + Send + Sync> MatVec<Vec<T>> for CsrMatrix<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        self.spmv(x, y);
    }
}

impl<T> Indexing for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows
    }
    fn ncols(&self) -> usize {
        self.ncols
    }
    fn nnz(&self) -> usize {
        self.values.len()
    }
}

impl<T: Float> MatrixGet<T> for CsrMatrix<T> {
    fn get(&self, i: usize, j: usize) -> T {
        let span = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[span.clone()].binary_search(&j) {
            Ok(k) => self.values[span.start + k],
            Err(_) => T::zero(),
        }
    }
}

impl<T> RowPattern<T> for CsrMatrix<T> {
    fn row_indices(&self, i: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[i]..self.row_ptr[i + 1]]
    }
    fn row_values(&self, i: usize) -> &[T] {
        &self.values[self.row_ptr[i]..self.row_ptr[i + 1]]
    }
}
