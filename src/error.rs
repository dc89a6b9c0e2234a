use thiserror::Error;

use crate::utils::convergence::ConvergedReason;

// Unified error type for kspsolve

#[derive(Error, Debug)]
pub enum KError {
    #[error("nonconforming object sizes: {0}")]
    DimensionMismatch(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("index {index} out of range 0..{bound}")]
    OutOfRange { index: usize, bound: usize },
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("solver did not converge: {reason} after {iterations} iterations")]
    NotConverged {
        reason: ConvergedReason,
        iterations: usize,
    },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl KError {
    /// PETSc-compatible error code, used as the process exit status.
    pub fn code(&self) -> i32 {
        match self {
            KError::Unsupported(_) => 56,
            KError::DimensionMismatch(_) => 60,
            KError::InvalidArgument(_) => 62,
            KError::OutOfRange { .. } => 63,
            KError::Io(_) => 66,
            KError::ZeroPivot(_) => 71,
            KError::NotConverged { .. } => 91,
        }
    }
}
