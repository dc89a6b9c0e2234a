// Jacobi preconditioner implementation

use std::fmt;

use crate::core::traits::{Indexing, MatrixGet};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use num_traits::Float;

/// Jacobi preconditioner: M⁻¹ = D⁻¹
#[derive(Clone, Debug)]
pub struct Jacobi<T> {
    pub(crate) inv_diag: Vec<T>,
}

impl<T: Float> Jacobi<T> {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new() }
    }

    /// Inverted diagonal computed by the last `setup`.
    pub fn inv_diag(&self) -> &[T] {
        &self.inv_diag
    }
}

impl<T: num_traits::Float> Default for Jacobi<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Jacobi<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type: jacobi")?;
        write!(f, "  type DIAGONAL")
    }
}

impl<M, V, T> Preconditioner<M, V> for Jacobi<T>
where
    M: MatrixGet<T> + Indexing,
    V: AsRef<[T]> + AsMut<[T]>,
    T: Float,
{
    fn setup(&mut self, a: &M) -> Result<(), KError> {
        let n = a.nrows();
        let mut zeros = 0usize;
        self.inv_diag = (0..n)
            .map(|i| {
                let d = a.get(i, i);
                if d == T::zero() {
                    // zero diagonal entries act as 1
                    zeros += 1;
                    T::one()
                } else {
                    T::one() / d
                }
            })
            .collect();
        if zeros > 0 {
            log::warn!("jacobi: {zeros} zero diagonal entries replaced by 1");
        }
        Ok(())
    }

    fn apply(&self, x: &V, y: &mut V) -> Result<(), KError> {
        let x_ref = x.as_ref();
        let y_mut = y.as_mut();
        if x_ref.len() != self.inv_diag.len() || y_mut.len() != self.inv_diag.len() {
            return Err(KError::DimensionMismatch(format!(
                "jacobi set up for {} rows, applied to {} -> {}",
                self.inv_diag.len(),
                x_ref.len(),
                y_mut.len()
            )));
        }
        for ((yi, &xi), &di) in y_mut.iter_mut().zip(x_ref).zip(&self.inv_diag) {
            *yi = di * xi;
        }
        Ok(())
    }
}
