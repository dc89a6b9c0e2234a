//! Context types for configuring and running solves.
//!
//! Contexts encapsulate algorithm selection, parameter management, and
//! construction of the solver/preconditioner pipeline, PETSc style.
//!
//! Modules:
//! - [`ksp_context`]: the `KspContext` solve handle, `SolverResult` and `benchmark`.
//! - [`pc_context`]: preconditioner selection (`PcType`, `PcSide`) and its factory.
//!
//! # References
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

pub mod ksp_context;
pub mod pc_context;

pub use ksp_context::{KspContext, SolverResult, benchmark};
pub use pc_context::{PcSide, PcType, build_pc};
