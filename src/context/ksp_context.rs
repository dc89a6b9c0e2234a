//! Krylov solver context (KSP).
//!
//! `KspContext` owns the pieces of a linear solve: a borrowed operator, the
//! GMRES solver with its tolerances, and the preconditioner selected by
//! [`PcType`]. It follows PETSc's life cycle:
//!
//! 1. `KspContext::new(&a)` with GMRES, `rtol = 1e-7`, `max_it = 1000` and Jacobi.
//! 2. Optional `set_*` calls or `set_from_options`.
//! 3. `setup()` (implicit on the first `solve`).
//! 4. `solve(b, x)` or `solve_with_result(b, x)`, then `print_info`.
//!
//! # Example
//! ```rust
//! use kspsolve::context::KspContext;
//! use kspsolve::matrix::{Layout, laplace_1d, rhs_vector};
//! let layout = Layout::serial(50);
//! let a = laplace_1d(50, &layout).unwrap();
//! let b = rhs_vector(50, &layout).unwrap();
//! let mut x = vec![0.0; 50];
//! let mut ksp = KspContext::new(&a);
//! let stats = ksp.solve(&b, &mut x).unwrap();
//! assert!(stats.converged);
//! ```

use std::fmt::LowerExp;
use std::io::Write;
use std::time::{Duration, Instant};

use num_traits::Float;

use crate::config::options::{KspOptions, PcOptions, SolverOptions};
use crate::context::pc_context::{PcSide, PcType, build_pc};
use crate::core::traits::{Indexing, InnerProduct, MatVec, MatrixGet, RowPattern};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::{GmresSolver, LinearSolver};
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};
use crate::utils::format::{exponential, general};

/// Outcome of one solve, as reported by the driver.
#[derive(Clone, Debug)]
pub struct SolverResult<T> {
    pub matrix_size: usize,
    pub nonzeros: usize,
    pub iterations: usize,
    pub residual: T,
    pub setup_time: Duration,
    pub solve_time: Duration,
    pub converged: bool,
    pub reason: ConvergedReason,
}

/// Context and configuration for a GMRES solve.
pub struct KspContext<'a, M, T> {
    a: &'a M,
    solver: GmresSolver<T>,
    pc_opts: PcOptions,
    pc: Option<Box<dyn Preconditioner<M, Vec<T>>>>,
    error_if_not_converged: bool,
    iterations: usize,
    residual: T,
    reason: ConvergedReason,
    setup_time: Duration,
    solve_time: Duration,
}

impl<'a, M, T> KspContext<'a, M, T>
where
    M: MatVec<Vec<T>> + MatrixGet<T> + RowPattern<T> + Indexing + Sync + 'static,
    (): InnerProduct<Vec<T>, Scalar = T>,
    T: Float + From<f64> + LowerExp + Send + Sync + 'static,
{
    /// Create a GMRES context for `a` with the default tolerances and Jacobi.
    pub fn new(a: &'a M) -> Self {
        let defaults = KspOptions::default();
        let solver = GmresSolver::new(defaults.restart, <T as From<f64>>::from(defaults.rtol), defaults.max_it)
            .with_tolerances(Convergence {
                rtol: <T as From<f64>>::from(defaults.rtol),
                atol: <T as From<f64>>::from(defaults.atol),
                dtol: <T as From<f64>>::from(defaults.dtol),
                max_iters: defaults.max_it,
            })
            .with_preconditioning(defaults.pc_side)
            .with_initial_guess_nonzero(defaults.initial_guess_nonzero);
        Self {
            a,
            solver,
            pc_opts: PcOptions::default(),
            pc: None,
            error_if_not_converged: defaults.error_if_not_converged,
            iterations: 0,
            residual: T::zero(),
            reason: ConvergedReason::Iterating,
            setup_time: Duration::ZERO,
            solve_time: Duration::ZERO,
        }
    }

    pub fn operator(&self) -> &'a M {
        self.a
    }

    pub fn pc_type(&self) -> PcType {
        self.pc_opts.pc_type
    }

    /// Select the preconditioner; takes effect at the next setup.
    pub fn set_pc_type(&mut self, pc_type: PcType) {
        if pc_type != self.pc_opts.pc_type {
            self.pc_opts.pc_type = pc_type;
            self.pc = None;
        }
    }

    pub fn set_pc_options(&mut self, opts: PcOptions) {
        if opts != self.pc_opts {
            self.pc_opts = opts;
            self.pc = None;
        }
    }

    /// Update the stopping criteria; `None` keeps the current value.
    pub fn set_tolerances(&mut self, rtol: Option<T>, atol: Option<T>, dtol: Option<T>, max_it: Option<usize>) {
        let conv = &mut self.solver.conv;
        if let Some(rtol) = rtol {
            conv.rtol = rtol;
        }
        if let Some(atol) = atol {
            conv.atol = atol;
        }
        if let Some(dtol) = dtol {
            conv.dtol = dtol;
        }
        if let Some(max_it) = max_it {
            conv.max_iters = max_it;
        }
    }

    pub fn tolerances(&self) -> &Convergence<T> {
        &self.solver.conv
    }

    pub fn set_restart(&mut self, restart: usize) -> Result<(), KError> {
        if restart == 0 {
            return Err(KError::InvalidArgument("GMRES restart must be positive".into()));
        }
        self.solver.restart = restart;
        Ok(())
    }

    pub fn set_pc_side(&mut self, side: PcSide) {
        self.solver.side = side;
    }

    pub fn set_initial_guess_nonzero(&mut self, flag: bool) {
        self.solver.initial_guess_nonzero = flag;
    }

    pub fn set_error_if_not_converged(&mut self, flag: bool) {
        self.error_if_not_converged = flag;
    }

    /// Install a per-iteration callback receiving `(iteration, residual norm)`.
    pub fn set_monitor<F>(&mut self, f: F)
    where
        F: FnMut(usize, T) + 'static,
    {
        self.solver.monitor = Some(Box::new(f));
    }

    /// Apply the KSP and PC parts of `opts`. `-ksp_monitor` installs a monitor
    /// printing PETSc-style lines to stdout.
    pub fn set_from_options(&mut self, opts: &SolverOptions) -> Result<(), KError> {
        let ksp = &opts.ksp;
        self.set_tolerances(
            Some(<T as From<f64>>::from(ksp.rtol)),
            Some(<T as From<f64>>::from(ksp.atol)),
            Some(<T as From<f64>>::from(ksp.dtol)),
            Some(ksp.max_it),
        );
        self.set_restart(ksp.restart)?;
        self.set_pc_side(ksp.pc_side);
        self.set_initial_guess_nonzero(ksp.initial_guess_nonzero);
        self.set_error_if_not_converged(ksp.error_if_not_converged);
        if ksp.monitor {
            self.set_monitor(|it, rnorm: T| {
                println!("{it:3} KSP Residual norm {}", exponential(to_f64(rnorm), 12));
            });
        }
        self.set_pc_options(opts.pc.clone());
        Ok(())
    }

    /// Check the operator and set the preconditioner up.
    pub fn setup(&mut self) -> Result<(), KError> {
        let start = Instant::now();
        let n = self.a.nrows();
        if n != self.a.ncols() {
            return Err(KError::DimensionMismatch(format!(
                "KSP needs a square operator, got {} x {}",
                n,
                self.a.ncols()
            )));
        }
        let mut pc = build_pc::<M, T>(self.pc_opts.pc_type, &self.pc_opts)?;
        pc.setup(self.a)?;
        self.pc = Some(pc);
        self.setup_time = start.elapsed();
        log::debug!(
            "KSP setup: n = {}, pc = {}, {:.3e} s",
            n,
            self.pc_opts.pc_type,
            self.setup_time.as_secs_f64()
        );
        Ok(())
    }

    /// Solve `A x = b`; sets up first if needed.
    ///
    /// A solve that stops without converging still returns `Ok` unless
    /// `error_if_not_converged` is set.
    pub fn solve(&mut self, b: &Vec<T>, x: &mut Vec<T>) -> Result<SolveStats<T>, KError> {
        let n = self.a.nrows();
        if b.len() != n || x.len() != n {
            return Err(KError::DimensionMismatch(format!(
                "operator has {} rows, rhs {}, solution {}",
                n,
                b.len(),
                x.len()
            )));
        }
        if self.pc.is_none() {
            self.setup()?;
        }
        self.solver.clear_history();
        let start = Instant::now();
        let stats = self.solver.solve(self.a, self.pc.as_deref(), b, x)?;
        self.solve_time = start.elapsed();
        self.iterations = stats.iterations;
        self.residual = stats.final_residual;
        self.reason = stats.reason;
        log::debug!(
            "KSP solve: {} after {} iterations, residual {:e}, {:.3e} s",
            stats.reason,
            stats.iterations,
            stats.final_residual,
            self.solve_time.as_secs_f64()
        );
        if !stats.converged {
            log::warn!("linear solve did not converge: {} ({} iterations)", stats.reason, stats.iterations);
            if self.error_if_not_converged {
                return Err(KError::NotConverged { reason: stats.reason, iterations: stats.iterations });
            }
        }
        Ok(stats)
    }

    /// Solve and collect the report fields.
    pub fn solve_with_result(&mut self, b: &Vec<T>, x: &mut Vec<T>) -> Result<SolverResult<T>, KError> {
        let stats = self.solve(b, x)?;
        Ok(SolverResult {
            matrix_size: self.a.nrows(),
            nonzeros: self.a.nnz(),
            iterations: stats.iterations,
            residual: stats.final_residual,
            setup_time: self.setup_time,
            solve_time: self.solve_time,
            converged: stats.converged,
            reason: stats.reason,
        })
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn residual_norm(&self) -> T {
        self.residual
    }

    pub fn converged_reason(&self) -> ConvergedReason {
        self.reason
    }

    pub fn residual_history(&self) -> &[T] {
        &self.solver.residual_history
    }

    pub fn setup_time(&self) -> Duration {
        self.setup_time
    }

    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }

    /// Describe the solver configuration, PETSc `KSPView` style.
    pub fn view<W: Write>(&self, out: &mut W) -> Result<(), KError> {
        let conv = &self.solver.conv;
        writeln!(out, "KSP Object:")?;
        writeln!(out, "  type: gmres")?;
        writeln!(
            out,
            "    restart={}, using Modified Gram-Schmidt Orthogonalization with one refinement",
            self.solver.restart
        )?;
        writeln!(out, "    happy breakdown tolerance 1e-14")?;
        writeln!(
            out,
            "  maximum iterations={}, initial guess is {}",
            conv.max_iters,
            if self.solver.initial_guess_nonzero { "nonzero" } else { "zero" }
        )?;
        writeln!(
            out,
            "  tolerances: relative={}, absolute={}, divergence={}",
            general(to_f64(conv.rtol)),
            general(to_f64(conv.atol)),
            general(to_f64(conv.dtol))
        )?;
        let side = self.solver.side;
        writeln!(out, "  {} preconditioning", side.to_string().to_lowercase())?;
        let norm_type = match side {
            PcSide::Left => "PRECONDITIONED",
            PcSide::Right => "UNPRECONDITIONED",
        };
        writeln!(out, "  using {norm_type} norm type for convergence test")?;
        writeln!(out, "PC Object:")?;
        match &self.pc {
            Some(pc) => {
                for line in pc.to_string().lines() {
                    writeln!(out, "  {line}")?;
                }
            }
            None => writeln!(out, "  type: {} (not set up)", self.pc_opts.pc_type)?,
        }
        writeln!(out, "  linear system matrix = precond matrix:")?;
        writeln!(
            out,
            "  Mat Object: type: csr, rows={}, cols={}, nonzeros={}",
            self.a.nrows(),
            self.a.ncols(),
            self.a.nnz()
        )?;
        Ok(())
    }

    /// The `=== Solver Information ===` block followed by the view.
    pub fn print_info<W: Write>(&self, out: &mut W) -> Result<(), KError> {
        writeln!(out, "=== Solver Information ===")?;
        writeln!(out, "Matrix size: {}", self.a.nrows())?;
        writeln!(out, "Iterations: {}", self.iterations)?;
        writeln!(out, "Final residual: {}", general(to_f64(self.residual)))?;
        writeln!(out, "Solve time: {} seconds", general(self.solve_time.as_secs_f64()))?;
        self.view(out)
    }
}

fn to_f64<T: Float>(v: T) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// Create a context, select `pc_type`, set it up (timed as setup time) and
/// solve once.
pub fn benchmark<M, T>(
    a: &M,
    b: &Vec<T>,
    x: &mut Vec<T>,
    pc_type: PcType,
    opts: &SolverOptions,
) -> Result<SolverResult<T>, KError>
where
    M: MatVec<Vec<T>> + MatrixGet<T> + RowPattern<T> + Indexing + Sync + 'static,
    (): InnerProduct<Vec<T>, Scalar = T>,
    T: Float + From<f64> + LowerExp + Send + Sync + 'static,
{
    let start = Instant::now();
    let mut ksp = KspContext::new(a);
    ksp.set_from_options(opts)?;
    ksp.set_pc_type(pc_type);
    ksp.setup()?;
    let setup_time = start.elapsed();
    let mut result = ksp.solve_with_result(b, x)?;
    result.setup_time = setup_time;
    Ok(result)
}
