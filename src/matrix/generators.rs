//! Test-problem assembly: 1-D Laplacian, scaled identity, random diagonally
//! dominant matrices, and the right-hand side.
//!
//! Every generator assembles through [`CsrMatrix::from_rows`], so each
//! ownership range of the layout fills only its own rows.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::traits::Indexing;
use crate::error::KError;
use crate::matrix::layout::Layout;
use crate::matrix::sparse::CsrMatrix;

/// Which test matrix to assemble.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MatrixKind {
    #[default]
    Laplace,
    Diagonal,
    Random,
}

impl MatrixKind {
    pub fn name(self) -> &'static str {
        match self {
            MatrixKind::Laplace => "Laplace",
            MatrixKind::Diagonal => "diagonal",
            MatrixKind::Random => "random sparse",
        }
    }
}

fn check_size(n: usize) -> Result<(), KError> {
    if n == 0 {
        return Err(KError::InvalidArgument("matrix dimension must be positive".into()));
    }
    Ok(())
}

/// Tridiagonal `[-1, 2, -1]` of order `n`.
pub fn laplace_1d(n: usize, layout: &Layout) -> Result<CsrMatrix<f64>, KError> {
    check_size(n)?;
    CsrMatrix::from_rows(n, n, layout, |i, row| {
        if i > 0 {
            row.set(i - 1, -1.0)?;
        }
        row.set(i, 2.0)?;
        if i + 1 < n {
            row.set(i + 1, -1.0)?;
        }
        Ok(())
    })
}

/// `value · I` of order `n`.
pub fn diagonal(n: usize, value: f64, layout: &Layout) -> Result<CsrMatrix<f64>, KError> {
    check_size(n)?;
    CsrMatrix::from_rows(n, n, layout, |i, row| row.set(i, value))
}

/// Random sparse matrix with strict diagonal dominance.
///
/// Each entry of row `i` is present with probability `density` and drawn from
/// `[0, 1)`; the diagonal is then overwritten with `u + n`. Every row uses its
/// own generator seeded from `(seed, i)`, so the result does not depend on how
/// rows are split across ownership ranges.
pub fn random_sparse(n: usize, density: f64, seed: u64, layout: &Layout) -> Result<CsrMatrix<f64>, KError> {
    check_size(n)?;
    if !(0.0..=1.0).contains(&density) {
        return Err(KError::InvalidArgument(format!("density {density} outside [0, 1]")));
    }
    let shift = n as f64;
    CsrMatrix::from_rows(n, n, layout, |i, row| {
        let mut rng = StdRng::seed_from_u64(seed ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        for j in 0..n {
            if rng.gen_range(0.0..1.0) < density {
                row.set(j, rng.gen_range(0.0..1.0))?;
            }
        }
        row.set(i, rng.gen_range(0.0..1.0) + shift)
    })
}

/// Uniform right-hand side `b = 1`, filled per ownership range.
pub fn rhs_vector(n: usize, layout: &Layout) -> Result<Vec<f64>, KError> {
    check_size(n)?;
    if layout.size() != n {
        return Err(KError::DimensionMismatch(format!(
            "layout covers {} rows, vector has {n}",
            layout.size()
        )));
    }
    let mut b = vec![0.0; n];
    for range in layout.ranges() {
        b[range].fill(1.0);
    }
    Ok(b)
}

/// Size and fill summary of an assembled operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixInfo {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub nonzeros: usize,
}

pub fn matrix_info<M: Indexing>(a: &M, name: &str) -> MatrixInfo {
    MatrixInfo {
        name: name.to_string(),
        rows: a.nrows(),
        cols: a.ncols(),
        nonzeros: a.nnz(),
    }
}

impl fmt::Display for MatrixInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Matrix {}: {} x {}, type: csr, nonzeros: {}",
            self.name, self.rows, self.cols, self.nonzeros
        )
    }
}
