//! Command-line or API options for solvers, preconditioners and test matrices.
//!
//! These structs carry the PETSc-named knobs (`-ksp_rtol`, `-pc_type`, ...)
//! after parsing. Every struct's `Default` holds the values a freshly created
//! solver uses, so a caller only overrides what it cares about.

use crate::context::pc_context::{PcSide, PcType};
use crate::matrix::MatrixKind;
use crate::solver::gmres::DEFAULT_RESTART;

/// Krylov solver parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct KspOptions {
    /// Relative tolerance on the residual norm
    pub rtol: f64,
    /// Absolute tolerance on the residual norm
    pub atol: f64,
    /// Divergence tolerance, relative to the initial residual norm
    pub dtol: f64,
    /// Maximum number of iterations
    pub max_it: usize,
    /// GMRES restart length
    pub restart: usize,
    pub pc_side: PcSide,
    /// Print the residual norm every iteration
    pub monitor: bool,
    pub initial_guess_nonzero: bool,
    /// Turn a diverged solve into an error
    pub error_if_not_converged: bool,
}

impl Default for KspOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-7,
            atol: 1e-50,
            dtol: 1e5,
            max_it: 1000,
            restart: DEFAULT_RESTART,
            pc_side: PcSide::Left,
            monitor: false,
            initial_guess_nonzero: false,
            error_if_not_converged: false,
        }
    }
}

/// Preconditioner type & parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcOptions {
    /// Type of preconditioner (jacobi, bjacobi, none)
    pub pc_type: PcType,
    /// Number of Block-Jacobi blocks
    pub bjacobi_blocks: usize,
}

impl Default for PcOptions {
    fn default() -> Self {
        Self { pc_type: PcType::Jacobi, bjacobi_blocks: 1 }
    }
}

/// Test-problem parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixOptions {
    pub kind: MatrixKind,
    /// Matrix dimension
    pub n: usize,
    /// Value on the diagonal of the `diagonal` matrix
    pub diagonal: f64,
    /// Off-diagonal fill probability of the `random` matrix
    pub density: f64,
    pub seed: u64,
    /// Print the matrix summary line before solving
    pub view_info: bool,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            kind: MatrixKind::Laplace,
            n: 1000,
            diagonal: 2.0,
            density: 0.01,
            seed: 42,
            view_info: false,
        }
    }
}

/// Everything a run needs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverOptions {
    pub ksp: KspOptions,
    pub pc: PcOptions,
    pub matrix: MatrixOptions,
    /// Worker threads; `None` uses every core
    pub threads: Option<usize>,
}
