//! Convergence tracking & tolerance checks for iterative solvers.
//!
//! Mirrors PETSc's default KSP convergence test: with `r0` the norm of the
//! initial residual, iteration stops on `‖r‖ ≤ max(rtol·r0, atol)`, diverges on
//! `‖r‖ ≥ dtol·r0`, on a non-finite norm, or when `max_iters` is reached.

use std::fmt;

/// Why an iterative solve stopped. Codes and names follow `KSPConvergedReason`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ConvergedReason {
    #[default]
    Iterating,
    ConvergedRtol,
    ConvergedAtol,
    /// The Krylov operator maps the current direction to zero.
    DivergedNull,
    DivergedIts,
    DivergedDtol,
    DivergedBreakdown,
    DivergedNanOrInf,
}

impl ConvergedReason {
    pub fn is_converged(self) -> bool {
        self.code() > 0
    }

    pub fn is_diverged(self) -> bool {
        self.code() < 0
    }

    pub fn code(self) -> i32 {
        match self {
            ConvergedReason::Iterating => 0,
            ConvergedReason::ConvergedRtol => 2,
            ConvergedReason::ConvergedAtol => 3,
            ConvergedReason::DivergedNull => -2,
            ConvergedReason::DivergedIts => -3,
            ConvergedReason::DivergedDtol => -4,
            ConvergedReason::DivergedBreakdown => -5,
            ConvergedReason::DivergedNanOrInf => -9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConvergedReason::Iterating => "CONVERGED_ITERATING",
            ConvergedReason::ConvergedRtol => "CONVERGED_RTOL",
            ConvergedReason::ConvergedAtol => "CONVERGED_ATOL",
            ConvergedReason::DivergedNull => "DIVERGED_NULL",
            ConvergedReason::DivergedIts => "DIVERGED_ITS",
            ConvergedReason::DivergedDtol => "DIVERGED_DTOL",
            ConvergedReason::DivergedBreakdown => "DIVERGED_BREAKDOWN",
            ConvergedReason::DivergedNanOrInf => "DIVERGED_NANORINF",
        }
    }
}

impl fmt::Display for ConvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stopping criteria.
#[derive(Clone, Debug)]
pub struct Convergence<T> {
    /// Relative decrease of the residual norm.
    pub rtol: T,
    /// Absolute size of the residual norm.
    pub atol: T,
    /// Divergence threshold, relative to the initial residual norm.
    pub dtol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub final_residual: T,
    pub converged: bool,
    pub reason: ConvergedReason,
}

impl<T: Copy + num_traits::Float> SolveStats<T> {
    pub(crate) fn new(iterations: usize, final_residual: T, reason: ConvergedReason) -> Self {
        Self {
            iterations,
            final_residual,
            converged: reason.is_converged(),
            reason,
        }
    }
}

impl<T: Copy + num_traits::Float> Convergence<T> {
    /// Classify `res_norm` at iteration `i` against the initial norm `res0_norm`.
    pub fn check(&self, res_norm: T, res0_norm: T, i: usize) -> ConvergedReason {
        if !res_norm.is_finite() {
            return ConvergedReason::DivergedNanOrInf;
        }
        if res_norm <= self.atol {
            return ConvergedReason::ConvergedAtol;
        }
        if res_norm <= self.rtol * res0_norm {
            return ConvergedReason::ConvergedRtol;
        }
        if res_norm >= self.dtol * res0_norm {
            return ConvergedReason::DivergedDtol;
        }
        if i >= self.max_iters {
            return ConvergedReason::DivergedIts;
        }
        ConvergedReason::Iterating
    }
}
