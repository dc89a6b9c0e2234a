// Identity preconditioner (PETSc's PCNONE)

use std::fmt;

use crate::error::KError;
use crate::preconditioner::Preconditioner;

/// z = r
#[derive(Clone, Copy, Debug, Default)]
pub struct PcNone;

impl fmt::Display for PcNone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type: none")
    }
}

impl<M, T: Copy> Preconditioner<M, Vec<T>> for PcNone {
    fn apply(&self, r: &Vec<T>, z: &mut Vec<T>) -> Result<(), KError> {
        if r.len() != z.len() {
            return Err(KError::DimensionMismatch(format!("{} -> {}", r.len(), z.len())));
        }
        z.copy_from_slice(r);
        Ok(())
    }
}
