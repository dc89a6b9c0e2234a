//! ILU(0) factorization with zero fill (Saad §10.3).
//!
//! The factors keep the sparsity pattern of the (block of the) input matrix:
//! `L` is unit lower triangular and stored below the diagonal, `U` on and above
//! it, both in one CSR array.

use std::fmt;
use std::ops::Range;

use num_traits::Float;

use crate::core::traits::{Indexing, RowPattern};
use crate::error::KError;
use crate::preconditioner::Preconditioner;

#[derive(Clone, Debug)]
pub struct Ilu0<T> {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    lu: Vec<T>,
    diag: Vec<usize>,
}

impl<T: Float> Ilu0<T> {
    pub fn new() -> Self {
        Self {
            row_ptr: vec![0],
            col_idx: Vec::new(),
            lu: Vec::new(),
            diag: Vec::new(),
        }
    }

    /// Order of the factored block.
    pub fn size(&self) -> usize {
        self.diag.len()
    }

    /// Factor the diagonal block `A[range, range]`; entries outside the block
    /// are dropped. Row `i` of the factor corresponds to row `range.start + i`.
    pub fn factor_block<M: RowPattern<T>>(a: &M, range: Range<usize>) -> Result<Self, KError> {
        let n = range.len();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        let mut lu = Vec::new();
        let mut diag = Vec::with_capacity(n);
        row_ptr.push(0);
        for i in range.clone() {
            let mut diag_pos = None;
            for (&j, &v) in a.row_indices(i).iter().zip(a.row_values(i)) {
                if !range.contains(&j) {
                    continue;
                }
                if j == i {
                    diag_pos = Some(col_idx.len());
                }
                col_idx.push(j - range.start);
                lu.push(v);
            }
            diag.push(diag_pos.ok_or(KError::ZeroPivot(i))?);
            row_ptr.push(col_idx.len());
        }

        // IKJ variant of Gaussian elimination restricted to the pattern.
        for i in 0..n {
            for kk in row_ptr[i]..diag[i] {
                let k = col_idx[kk];
                let pivot = lu[diag[k]];
                if pivot == T::zero() {
                    return Err(KError::ZeroPivot(range.start + k));
                }
                let lik = lu[kk] / pivot;
                lu[kk] = lik;
                // row_i[j] -= l_ik * row_k[j] for j > k present in both rows
                let mut p = kk + 1;
                let mut q = diag[k] + 1;
                while p < row_ptr[i + 1] && q < row_ptr[k + 1] {
                    match col_idx[p].cmp(&col_idx[q]) {
                        std::cmp::Ordering::Less => p += 1,
                        std::cmp::Ordering::Greater => q += 1,
                        std::cmp::Ordering::Equal => {
                            lu[p] = lu[p] - lik * lu[q];
                            p += 1;
                            q += 1;
                        }
                    }
                }
            }
            if lu[diag[i]] == T::zero() {
                return Err(KError::ZeroPivot(range.start + i));
            }
        }
        Ok(Self { row_ptr, col_idx, lu, diag })
    }

    /// Solve `L U z = r`.
    pub fn solve(&self, r: &[T], z: &mut [T]) -> Result<(), KError> {
        let n = self.size();
        if r.len() != n || z.len() != n {
            return Err(KError::DimensionMismatch(format!(
                "ILU(0) factor of order {n} applied to {} -> {}",
                r.len(),
                z.len()
            )));
        }
        // solve L y = r
        for i in 0..n {
            let mut acc = r[i];
            for kk in self.row_ptr[i]..self.diag[i] {
                acc = acc - self.lu[kk] * z[self.col_idx[kk]];
            }
            z[i] = acc;
        }
        // solve U z = y
        for i in (0..n).rev() {
            let mut acc = z[i];
            for kk in (self.diag[i] + 1)..self.row_ptr[i + 1] {
                acc = acc - self.lu[kk] * z[self.col_idx[kk]];
            }
            z[i] = acc / self.lu[self.diag[i]];
        }
        Ok(())
    }
}

impl<T: Float> Default for Ilu0<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Ilu0<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type: ilu")?;
        writeln!(f, "  out-of-place factorization")?;
        writeln!(f, "  0 levels of fill")?;
        write!(f, "  factor fill ratio given 1., needed 1.")
    }
}

impl<M, V, T> Preconditioner<M, V> for Ilu0<T>
where
    M: RowPattern<T> + Indexing,
    V: AsRef<[T]> + AsMut<[T]>,
    T: Float,
{
    fn setup(&mut self, a: &M) -> Result<(), KError> {
        if a.nrows() != a.ncols() {
            return Err(KError::DimensionMismatch(format!(
                "ILU(0) needs a square matrix, got {} x {}",
                a.nrows(),
                a.ncols()
            )));
        }
        *self = Self::factor_block(a, 0..a.nrows())?;
        Ok(())
    }

    fn apply(&self, r: &V, z: &mut V) -> Result<(), KError> {
        self.solve(r.as_ref(), z.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MatVec;
    use crate::matrix::{CsrMatrix, Layout, laplace_1d};
    use approx::assert_relative_eq;

    #[test]
    fn exact_on_tridiagonal() {
        // no fill-in for a tridiagonal matrix, so ILU(0) is the exact LU
        let n = 20;
        let a = laplace_1d(n, &Layout::serial(n)).unwrap();
        let mut ilu = Ilu0::new();
        Preconditioner::<CsrMatrix<f64>, Vec<f64>>::setup(&mut ilu, &a).unwrap();
        let x_true: Vec<f64> = (0..n).map(|i| (i as f64).sin() + 1.0).collect();
        let mut b = vec![0.0; n];
        a.matvec(&x_true, &mut b);
        let mut x = vec![0.0; n];
        ilu.solve(&b, &mut x).unwrap();
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(*xi, *ti, epsilon = 1e-12);
        }
    }

    #[test]
    fn block_drops_coupling() {
        let a = laplace_1d(6, &Layout::serial(6)).unwrap();
        let ilu = Ilu0::factor_block(&a, 3..6).unwrap();
        assert_eq!(ilu.size(), 3);
        // [2 -1 0; -1 2 -1; 0 -1 2] z = [1 0 1] -> z = [1 1 1]
        let mut z = vec![0.0; 3];
        ilu.solve(&[1.0, 0.0, 1.0], &mut z).unwrap();
        for zi in z {
            assert_relative_eq!(zi, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn missing_diagonal_is_zero_pivot() {
        let a = CsrMatrix::from_csr(2, 2, vec![0, 1, 2], vec![1, 0], vec![1.0, 1.0]).unwrap();
        let res = Ilu0::factor_block(&a, 0..2);
        assert!(matches!(res, Err(KError::ZeroPivot(0))));
    }
}
