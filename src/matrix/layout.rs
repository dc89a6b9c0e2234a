//! Row ownership ranges.
//!
//! A `Layout` splits `0..n` into contiguous parts the way PETSc's `PETSC_DECIDE`
//! does: every part gets `n / parts` rows and the first `n % parts` parts get
//! one extra. Assembly fills each part's rows independently, and Block Jacobi
//! uses the parts as its blocks.

use std::ops::Range;

use crate::error::KError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    n: usize,
    starts: Vec<usize>,
}

impl Layout {
    /// Split `n` rows into `parts` ownership ranges.
    pub fn split(n: usize, parts: usize) -> Result<Self, KError> {
        if parts == 0 {
            return Err(KError::InvalidArgument("layout needs at least one part".into()));
        }
        if parts > n.max(1) {
            return Err(KError::InvalidArgument(format!(
                "cannot split {n} rows into {parts} non-empty parts"
            )));
        }
        let base = n / parts;
        let extra = n % parts;
        let mut starts = Vec::with_capacity(parts + 1);
        let mut start = 0;
        starts.push(start);
        for p in 0..parts {
            start += base + usize::from(p < extra);
            starts.push(start);
        }
        Ok(Self { n, starts })
    }

    /// A single part owning every row.
    pub fn serial(n: usize) -> Self {
        Self { n, starts: vec![0, n] }
    }

    /// Global number of rows.
    pub fn size(&self) -> usize {
        self.n
    }

    pub fn parts(&self) -> usize {
        self.starts.len() - 1
    }

    /// Rows `[start, end)` owned by `part`.
    pub fn ownership_range(&self, part: usize) -> Range<usize> {
        self.starts[part]..self.starts[part + 1]
    }

    pub fn ranges(&self) -> impl ExactSizeIterator<Item = Range<usize>> + '_ {
        self.starts.windows(2).map(|w| w[0]..w[1])
    }

    /// The part owning `row`.
    pub fn owner_of(&self, row: usize) -> Result<usize, KError> {
        if row >= self.n {
            return Err(KError::OutOfRange { index: row, bound: self.n });
        }
        // last start <= row
        Ok(self.starts.partition_point(|&s| s <= row) - 1)
    }
}
