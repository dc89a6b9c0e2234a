//! Preconditioners for linear solvers.
//!
//! This module defines the Preconditioner trait and the Jacobi, Block-Jacobi
//! (with ILU(0) blocks) and identity preconditioners.

use std::fmt;

use crate::error::KError;

/// A preconditioner M ≈ A⁻¹.
///
/// `Display` renders the body of the solver view (`type: ...` and settings).
pub trait Preconditioner<M, V>: fmt::Display {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), KError>;
    /// Optionally: setup/factorize from A
    fn setup(&mut self, _a: &M) -> Result<(), KError> {
        Ok(())
    }
}

// Submodules for various preconditioners
pub mod block_jacobi;
pub mod ilu;
pub mod jacobi;
pub mod none;

// Re-exports for convenience
pub use block_jacobi::BlockJacobi;
pub use ilu::Ilu0;
pub use jacobi::Jacobi;
pub use none::PcNone;

/// Preconditioner selector and factory.
pub use crate::context::pc_context::{PcSide, PcType, build_pc};
