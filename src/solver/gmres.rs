//! Generalized Minimal Residual (GMRES) solver with fixed restart (Saad §6.4)
//!
//! Restarted GMRES(m) for large, sparse, possibly nonsymmetric systems Ax = b.
//! The Arnoldi basis is orthogonalized with modified Gram-Schmidt plus one
//! refinement pass, the Hessenberg least-squares problem is reduced with Givens
//! rotations, and an invariant Krylov subspace (happy breakdown) ends the cycle
//! early.
//!
//! With left preconditioning (the default, as in PETSc) GMRES runs on M⁻¹A and
//! the residual norm it monitors is ‖M⁻¹(b - Ax)‖. With right preconditioning it
//! runs on AM⁻¹ and monitors the true residual.
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §6.4
//! - https://en.wikipedia.org/wiki/Generalized_minimal_residual_method

use crate::context::pc_context::PcSide;
use crate::core::traits::{Indexing, InnerProduct, MatVec};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::LinearSolver;
use crate::utils::convergence::{ConvergedReason, Convergence, SolveStats};
use num_traits::Float;

/// Default number of Arnoldi vectors before restart.
pub const DEFAULT_RESTART: usize = 30;

/// Relative size of the new Arnoldi direction below which the Krylov subspace
/// is treated as invariant.
const HAPPY_BREAKDOWN_TOL: f64 = 1e-14;

/// GMRES solver struct with restart and preconditioning options.
///
/// # Type Parameters
/// * `T` - Scalar type (e.g., f32, f64)
pub struct GmresSolver<T> {
    /// Number of Arnoldi vectors before restart
    pub restart: usize,
    /// Convergence criteria
    pub conv: Convergence<T>,
    /// Side the preconditioner is applied on
    pub side: PcSide,
    /// Use the incoming `x` as initial guess instead of zero
    pub initial_guess_nonzero: bool,
    pub monitor: Option<Box<dyn FnMut(usize, T)>>,
    pub residual_history: Vec<T>,
}

impl<T: Copy + Float + From<f64>> GmresSolver<T> {
    /// Create a new GMRES solver with restart, relative tolerance, and max iterations.
    ///
    /// The absolute and divergence tolerances take PETSc's defaults (1e-50, 1e5).
    pub fn new(restart: usize, rtol: T, max_iters: usize) -> Self {
        Self {
            restart,
            conv: Convergence {
                rtol,
                atol: <T as From<f64>>::from(1e-50),
                dtol: <T as From<f64>>::from(1e5),
                max_iters,
            },
            side: PcSide::Left,
            initial_guess_nonzero: false,
            monitor: None,
            residual_history: Vec::new(),
        }
    }
    /// Set the preconditioning side.
    pub fn with_preconditioning(mut self, side: PcSide) -> Self {
        self.side = side;
        self
    }
    pub fn with_tolerances(mut self, conv: Convergence<T>) -> Self {
        self.conv = conv;
        self
    }
    pub fn with_initial_guess_nonzero(mut self, flag: bool) -> Self {
        self.initial_guess_nonzero = flag;
        self
    }
    pub fn with_monitor<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, T) + 'static,
    {
        self.monitor = Some(Box::new(f));
        self
    }
    pub fn clear_history(&mut self) {
        self.residual_history.clear();
    }

    fn record(&mut self, it: usize, rnorm: T) {
        self.residual_history.push(rnorm);
        if let Some(monitor) = self.monitor.as_mut() {
            monitor(it, rnorm);
        }
    }

    // --- Apply Givens rotation and update g together ---
    /// Apply Givens rotations to Hessenberg matrix and update g vector.
    ///
    /// Returns `false` when column `j` reduces to zero; `g` is then left as is.
    fn apply_givens_and_update_g(h: &mut [Vec<T>], g: &mut [T], cs: &mut [T], sn: &mut [T], j: usize) -> bool {
        for i in 0..j {
            let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
            h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
            h[i][j] = temp;
        }
        let h_kk = h[j][j];
        let h_k1k = h[j + 1][j];
        let r = h_kk.hypot(h_k1k);
        if r == T::zero() {
            cs[j] = T::one();
            sn[j] = T::zero();
            return false;
        }
        cs[j] = h_kk / r;
        sn[j] = h_k1k / r;
        h[j][j] = r;
        h[j + 1][j] = T::zero();
        // Update g
        let temp = cs[j] * g[j] + sn[j] * g[j + 1];
        g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
        g[j] = temp;
        true
    }

    // --- Back-substitution for least squares with zero-pivot protection ---
    /// Solve upper-triangular system Hy = g for y, with zero-pivot protection.
    fn back_substitution(h: &[Vec<T>], g: &[T], m: usize) -> Vec<T> {
        let mut y = vec![T::zero(); m];
        for i in (0..m).rev() {
            let mut acc = g[i];
            for j in (i + 1)..m {
                acc = acc - h[i][j] * y[j];
            }
            y[i] = if h[i][i] != T::zero() { acc / h[i][i] } else { T::zero() };
        }
        y
    }
}

fn axpy<T: Float>(alpha: T, x: &[T], y: &mut [T]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = *yi + alpha * xi;
    }
}

impl<M, T> LinearSolver<M, Vec<T>> for GmresSolver<T>
where
    M: MatVec<Vec<T>> + Indexing,
    (): InnerProduct<Vec<T>, Scalar = T>,
    T: Float + From<f64> + std::fmt::LowerExp,
{
    type Error = KError;
    type Scalar = T;

    /// Solve the linear system Ax = b using restarted GMRES.
    ///
    /// # Arguments
    /// * `a` - Operator implementing `MatVec`
    /// * `pc` - Optional preconditioner, applied on `self.side`
    /// * `b` - Right-hand side vector
    /// * `x` - On input: initial guess if `initial_guess_nonzero`; on output: solution vector
    ///
    /// # Returns
    /// * `Ok(SolveStats)` whether or not the iteration converged; check `stats.reason`
    /// * `Err(KError)` on size mismatches or preconditioner failures
    fn solve(
        &mut self,
        a: &M,
        pc: Option<&dyn Preconditioner<M, Vec<T>>>,
        b: &Vec<T>,
        x: &mut Vec<T>,
    ) -> Result<SolveStats<T>, KError> {
        let n = b.len();
        if a.nrows() != n || a.ncols() != n || x.len() != n {
            return Err(KError::DimensionMismatch(format!(
                "operator {} x {}, rhs {}, solution {}",
                a.nrows(),
                a.ncols(),
                n,
                x.len()
            )));
        }
        if self.restart == 0 {
            return Err(KError::InvalidArgument("GMRES restart must be positive".into()));
        }
        let ip = ();
        let m = self.restart;
        let left = self.side == PcSide::Left;
        let apply_pc = |r: &Vec<T>, z: &mut Vec<T>| -> Result<(), KError> {
            match pc {
                Some(pc) => pc.apply(r, z),
                None => {
                    z.copy_from_slice(r);
                    Ok(())
                }
            }
        };
        // r = b - A x, then M⁻¹ r for left preconditioning
        let residual = |x: &Vec<T>| -> Result<Vec<T>, KError> {
            let mut ax = vec![T::zero(); n];
            a.matvec(x, &mut ax);
            let r: Vec<T> = b.iter().zip(&ax).map(|(&bi, &axi)| bi - axi).collect();
            if left {
                let mut z = vec![T::zero(); n];
                apply_pc(&r, &mut z)?;
                Ok(z)
            } else {
                Ok(r)
            }
        };

        if !self.initial_guess_nonzero {
            x.iter_mut().for_each(|xi| *xi = T::zero());
        }
        let mut r = residual(&*x)?;
        let mut beta = ip.norm(&r);
        let rnorm0 = beta;
        self.record(0, beta);
        let mut reason = self.conv.check(beta, rnorm0, 0);
        let mut iteration = 0;
        let mut rnorm = beta;
        let happy_tol = <T as From<f64>>::from(HAPPY_BREAKDOWN_TOL);

        while reason == ConvergedReason::Iterating {
            // Krylov basis and, for right preconditioning, z_j = M⁻¹ v_j
            let mut v_basis: Vec<Vec<T>> = Vec::with_capacity(m + 1);
            let mut z_basis: Vec<Vec<T>> = Vec::with_capacity(if left { 0 } else { m });
            v_basis.push(r.iter().map(|&ri| ri / beta).collect());
            let mut h = vec![vec![T::zero(); m]; m + 1];
            let mut g = vec![T::zero(); m + 1];
            g[0] = beta;
            let mut cs = vec![T::zero(); m];
            let mut sn = vec![T::zero(); m];
            let mut k = 0;

            for j in 0..m {
                iteration += 1;
                let mut w = vec![T::zero(); n];
                if left {
                    let mut av = vec![T::zero(); n];
                    a.matvec(&v_basis[j], &mut av);
                    apply_pc(&av, &mut w)?;
                } else {
                    let mut z = vec![T::zero(); n];
                    apply_pc(&v_basis[j], &mut z)?;
                    a.matvec(&z, &mut w);
                    z_basis.push(z);
                }
                let w_norm0 = ip.norm(&w);
                // Modified Gram-Schmidt with one refinement pass
                for _ in 0..2 {
                    for (i, vi) in v_basis.iter().enumerate() {
                        let hij = ip.dot(&w, vi);
                        h[i][j] = h[i][j] + hij;
                        axpy(-hij, vi, &mut w);
                    }
                }
                h[j + 1][j] = ip.norm(&w);
                let breakdown = h[j + 1][j] <= happy_tol * w_norm0;
                if !breakdown {
                    let scale = h[j + 1][j];
                    v_basis.push(w.iter().map(|&wi| wi / scale).collect());
                }
                if !Self::apply_givens_and_update_g(&mut h, &mut g, &mut cs, &mut sn, j) {
                    // A v_j = 0: the least-squares residual cannot decrease
                    rnorm = g[j].abs();
                    k = j;
                    self.record(iteration, rnorm);
                    log::warn!("gmres: null Hessenberg column at iteration {iteration}, operator is singular");
                    reason = ConvergedReason::DivergedNull;
                    break;
                }
                rnorm = g[j + 1].abs();
                k = j + 1;
                self.record(iteration, rnorm);
                log::trace!("gmres it {iteration}: residual norm {rnorm:e}");
                reason = self.conv.check(rnorm, rnorm0, iteration);
                if reason == ConvergedReason::Iterating && breakdown {
                    log::warn!("gmres: happy breakdown at iteration {iteration} without convergence");
                    reason = ConvergedReason::DivergedBreakdown;
                }
                if reason != ConvergedReason::Iterating {
                    break;
                }
            }

            // x += V y (left) or Z y (right)
            let y = Self::back_substitution(&h, &g, k);
            let basis = if left { &v_basis } else { &z_basis };
            for (yj, dir) in y.iter().zip(basis) {
                axpy(*yj, dir, x);
            }

            if reason == ConvergedReason::Iterating {
                // restart from the true (preconditioned) residual
                r = residual(&*x)?;
                beta = ip.norm(&r);
                rnorm = beta;
                reason = self.conv.check(beta, rnorm0, iteration);
                log::trace!("gmres restart at it {iteration}: residual norm {beta:e}");
            }
        }

        log::debug!("gmres: {reason} after {iteration} iterations, residual norm {rnorm:e}");
        Ok(SolveStats::new(iteration, rnorm, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MatVec;
    use crate::matrix::{CsrMatrix, Layout};
    use crate::preconditioner::{Jacobi, Preconditioner};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A = [[4,1.5,0,0],[1,3,1.5,0],[0,1,2,1.5],[0,0,1,3]]
    fn nonsym() -> CsrMatrix<f64> {
        let rows: [&[(usize, f64)]; 4] = [
            &[(0, 4.0), (1, 1.5)],
            &[(0, 1.0), (1, 3.0), (2, 1.5)],
            &[(1, 1.0), (2, 2.0), (3, 1.5)],
            &[(2, 1.0), (3, 3.0)],
        ];
        CsrMatrix::from_rows(4, 4, &Layout::serial(4), |i, row| {
            for &(j, v) in rows[i] {
                row.set(j, v)?;
            }
            Ok(())
        })
        .unwrap()
    }

    fn rhs(a: &CsrMatrix<f64>, x_true: &Vec<f64>) -> Vec<f64> {
        let mut b = vec![0.0; x_true.len()];
        a.matvec(x_true, &mut b);
        b
    }

    #[test]
    fn gmres_solves_well_conditioned_nonsym() {
        let a = nonsym();
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let b = rhs(&a, &x_true);
        let mut x = vec![0.0; 4];
        let mut solver = GmresSolver::new(4, 1e-10, 100);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-8, "xi = {}, expected = {}", xi, ei);
        }
        assert!(stats.converged, "GMRES did not converge");
        assert!(stats.iterations <= 4);
    }

    #[test]
    fn gmres_with_jacobi_left_and_right() {
        let a = nonsym();
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let b = rhs(&a, &x_true);
        let mut pc = Jacobi::new();
        Preconditioner::<CsrMatrix<f64>, Vec<f64>>::setup(&mut pc, &a).unwrap();
        for side in [PcSide::Left, PcSide::Right] {
            let mut x = vec![0.0; 4];
            let mut solver = GmresSolver::new(4, 1e-10, 100).with_preconditioning(side);
            let stats = solver.solve(&a, Some(&pc), &b, &mut x).unwrap();
            assert!(stats.converged, "{side:?} GMRES+Jacobi did not converge");
            for (xi, ei) in x.iter().zip(x_true.iter()) {
                assert!((xi - ei).abs() < 1e-8, "{side:?}: xi = {}, expected = {}", xi, ei);
            }
        }
    }

    #[test]
    fn restarts_until_converged() {
        // a ramp excites every eigenvector, so one cycle of 10 cannot finish
        let n = 20;
        let a = crate::matrix::laplace_1d(n, &Layout::serial(n)).unwrap();
        let b: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
        let b_norm = b.iter().map(|v| v * v).sum::<f64>().sqrt();
        let mut x = vec![0.0; n];
        let mut solver = GmresSolver::new(10, 1e-8, 2000);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert!(stats.iterations > 10, "expected at least one restart");
        let mut ax = vec![0.0; n];
        a.matvec(&x, &mut ax);
        let res: f64 = ax.iter().zip(&b).map(|(p, q)| (p - q).powi(2)).sum::<f64>().sqrt();
        assert!(res < 1e-6 * b_norm, "true residual {res}");
    }

    #[test]
    fn iteration_limit_reports_divergence() {
        let n = 50;
        let a = crate::matrix::laplace_1d(n, &Layout::serial(n)).unwrap();
        let b = vec![1.0; n];
        let mut x = vec![0.0; n];
        let mut solver = GmresSolver::new(3, 1e-12, 6);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert_eq!(stats.reason, ConvergedReason::DivergedIts);
        assert_eq!(stats.iterations, 6);
        assert!(!stats.converged);
    }

    #[test]
    fn singular_operator_is_not_converged() {
        let n = 10;
        let a = crate::matrix::diagonal(n, 0.0, &Layout::serial(n)).unwrap();
        let b = vec![1.0; n];
        let mut x = vec![0.0; n];
        let mut solver = GmresSolver::new(DEFAULT_RESTART, 1e-7, 1000);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert_eq!(stats.reason, ConvergedReason::DivergedNull);
        assert!(!stats.converged);
        assert_eq!(stats.iterations, 1);
        assert!((stats.final_residual - (n as f64).sqrt()).abs() < 1e-12);
        assert_eq!(x, vec![0.0; n]);
    }

    #[test]
    fn invariant_subspace_short_of_tolerance_is_breakdown() {
        // A v0 is parallel to v0 up to 5e-15, below the breakdown threshold
        let a = CsrMatrix::from_rows(2, 2, &Layout::serial(2), |i, row| {
            row.set(i, if i == 0 { 1.0 } else { 1.0 + 1e-14 })
        })
        .unwrap();
        let b = vec![1.0, 1.0];
        let mut x = vec![0.0; 2];
        let conv = Convergence { rtol: 1e-20, atol: 0.0, dtol: 1e5, max_iters: 100 };
        let mut solver = GmresSolver::new(2, 1e-20, 100).with_tolerances(conv);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert_eq!(stats.reason, ConvergedReason::DivergedBreakdown);
        assert_eq!(stats.iterations, 1);
        assert!(!stats.converged);
        assert!(stats.final_residual > 0.0);
        for xi in &x {
            assert!((xi - 1.0).abs() < 1e-12, "xi = {xi}");
        }
    }

    #[test]
    fn exact_initial_guess_needs_no_iterations() {
        let a = nonsym();
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let b = rhs(&a, &x_true);
        let mut x = x_true.clone();
        let mut solver = GmresSolver::new(4, 1e-10, 100).with_initial_guess_nonzero(true);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert_eq!(stats.iterations, 0);
        assert!(stats.converged);
        assert_eq!(x, x_true);
    }

    #[test]
    fn partial_initial_guess_is_refined() {
        let a = nonsym();
        let x_true = vec![1.0, 2.0, 3.0, 4.0];
        let b = rhs(&a, &x_true);
        let mut x = vec![1.0, 2.0, 0.0, 0.0];
        let mut solver = GmresSolver::new(4, 1e-10, 100).with_initial_guess_nonzero(true);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged);
        assert!(stats.iterations > 0);
        for (xi, ei) in x.iter().zip(x_true.iter()) {
            assert!((xi - ei).abs() < 1e-8, "xi = {}, expected = {}", xi, ei);
        }
    }

    #[test]
    fn zero_rhs_converges_immediately() {
        let a = nonsym();
        let mut x = vec![5.0; 4];
        let mut solver = GmresSolver::new(4, 1e-10, 100);
        let stats = solver.solve(&a, None, &vec![0.0; 4], &mut x).unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.reason, ConvergedReason::ConvergedAtol);
        assert_eq!(x, vec![0.0; 4]);
    }

    #[test]
    fn monitor_sees_every_iteration() {
        let a = nonsym();
        let b = vec![1.0; 4];
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut solver = GmresSolver::new(4, 1e-10, 100).with_monitor(move |it, r| sink.borrow_mut().push((it, r)));
        let mut x = vec![0.0; 4];
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), stats.iterations + 1);
        assert_eq!(seen[0].0, 0);
        assert_eq!(solver.residual_history.len(), seen.len());
    }

    #[test]
    fn rejects_mismatched_sizes() {
        let a = nonsym();
        let mut x = vec![0.0; 3];
        let mut solver = GmresSolver::new(4, 1e-10, 100);
        let res = solver.solve(&a, None, &vec![1.0; 4], &mut x);
        assert!(matches!(res, Err(KError::DimensionMismatch(_))));
    }
}
