//! Solver utilities.

pub mod convergence;
pub mod format;

pub use convergence::{ConvergedReason, Convergence, SolveStats};
