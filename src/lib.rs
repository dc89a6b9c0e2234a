//! kspsolve: PETSc-style KSP/PC interface for sparse GMRES
//!
//! This crate assembles sparse test systems (1-D Laplacian, scaled identity,
//! random diagonally dominant) in CSR form and solves them with restarted
//! GMRES under Jacobi, Block-Jacobi (ILU(0) blocks) or no preconditioning,
//! with shared-memory parallelism through rayon.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod driver;
pub mod error;
pub mod matrix;
pub mod preconditioner;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use error::*;
pub use matrix::*;
pub use preconditioner::{BlockJacobi, Ilu0, Jacobi, PcNone, Preconditioner};
pub use solver::*;
pub use utils::*;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
