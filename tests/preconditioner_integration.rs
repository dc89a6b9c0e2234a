//! Preconditioners driving GMRES on CSR matrices.
//!
//! Checks that Jacobi, Block Jacobi and the identity plug into GMRES on both
//! preconditioning sides, reach the known solution, and that stronger
//! preconditioners need fewer iterations.

use approx::assert_abs_diff_eq;
use kspsolve::context::{PcSide, PcType, build_pc};
use kspsolve::config::PcOptions;
use kspsolve::core::MatVec;
use kspsolve::matrix::{CsrMatrix, Layout};
use kspsolve::preconditioner::{BlockJacobi, Ilu0, Jacobi, PcNone, Preconditioner};
use kspsolve::solver::{GmresSolver, LinearSolver};

/// Non-symmetric tridiagonal `[-1, 2 + i/n, 0.5]` and `b = A * 1`.
fn nonsym_csr(n: usize) -> (CsrMatrix<f64>, Vec<f64>, Vec<f64>) {
    let layout = Layout::split(n, 3).unwrap();
    let a = CsrMatrix::from_rows(n, n, &layout, |i, row| {
        if i > 0 {
            row.set(i - 1, -1.0)?;
        }
        row.set(i, 2.0 + i as f64 / n as f64)?;
        if i + 1 < n {
            row.set(i + 1, 0.5)?;
        }
        Ok(())
    })
    .unwrap();
    let x_true = vec![1.0; n];
    let mut b = vec![0.0; n];
    a.matvec(&x_true, &mut b);
    (a, b, x_true)
}

fn rel_error(x: &[f64], x_true: &[f64]) -> f64 {
    let num: f64 = x.iter().zip(x_true).map(|(xi, ti)| (xi - ti).powi(2)).sum();
    let denom: f64 = x_true.iter().map(|ti| ti.powi(2)).sum();
    (num / denom).sqrt()
}

fn solve_with(
    a: &CsrMatrix<f64>,
    pc: &dyn Preconditioner<CsrMatrix<f64>, Vec<f64>>,
    side: PcSide,
    b: &[f64],
) -> (Vec<f64>, usize) {
    let mut solver = GmresSolver::new(30, 1e-12, 500).with_preconditioning(side);
    let mut x = vec![0.0; b.len()];
    let stats = solver.solve(a, Some(pc), &b.to_vec(), &mut x).unwrap();
    assert!(stats.converged, "{pc} did not converge: {}", stats.reason);
    (x, stats.iterations)
}

#[test]
fn every_pc_reaches_the_solution_on_both_sides() {
    let n = 40;
    let (a, b, x_true) = nonsym_csr(n);
    let opts = PcOptions { pc_type: PcType::Jacobi, bjacobi_blocks: 4 };
    for pc_type in PcType::ALL {
        let mut pc = build_pc::<CsrMatrix<f64>, f64>(pc_type, &opts).unwrap();
        pc.setup(&a).unwrap();
        for side in [PcSide::Left, PcSide::Right] {
            let (x, _) = solve_with(&a, pc.as_ref(), side, &b);
            assert!(rel_error(&x, &x_true) < 1e-9, "{pc_type} / {side}");
        }
    }
}

#[test]
fn stronger_preconditioners_need_fewer_iterations() {
    let (a, b, _) = nonsym_csr(200);

    let (_, its_none) = solve_with(&a, &PcNone, PcSide::Right, &b);

    let mut bjacobi = BlockJacobi::new(4);
    Preconditioner::<CsrMatrix<f64>, Vec<f64>>::setup(&mut bjacobi, &a).unwrap();
    let (_, its_bjacobi) = solve_with(&a, &bjacobi, PcSide::Right, &b);

    let mut exact = BlockJacobi::new(1);
    Preconditioner::<CsrMatrix<f64>, Vec<f64>>::setup(&mut exact, &a).unwrap();
    let (_, its_exact) = solve_with(&a, &exact, PcSide::Right, &b);

    assert!(its_exact <= 2);
    assert!(its_bjacobi < its_none);
}

#[test]
fn ilu0_matches_single_block_jacobi() {
    let n = 25;
    let (a, b, _) = nonsym_csr(n);
    let mut ilu = Ilu0::new();
    Preconditioner::<CsrMatrix<f64>, Vec<f64>>::setup(&mut ilu, &a).unwrap();
    let mut bjacobi = BlockJacobi::new(1);
    Preconditioner::<CsrMatrix<f64>, Vec<f64>>::setup(&mut bjacobi, &a).unwrap();
    let mut z_ilu = vec![0.0; n];
    let mut z_bj = vec![0.0; n];
    ilu.solve(&b, &mut z_ilu).unwrap();
    bjacobi.solve(&b, &mut z_bj).unwrap();
    for (u, v) in z_ilu.iter().zip(&z_bj) {
        assert_abs_diff_eq!(*u, *v, epsilon = 1e-14);
    }
    // tridiagonal: ILU(0) is the exact LU
    for zi in z_ilu {
        assert_abs_diff_eq!(zi, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn jacobi_is_exact_on_diagonal_matrices() {
    let n = 8;
    let layout = Layout::serial(n);
    let a = CsrMatrix::from_rows(n, n, &layout, |i, row| row.set(i, (i + 1) as f64)).unwrap();
    let mut pc = Jacobi::new();
    Preconditioner::<CsrMatrix<f64>, Vec<f64>>::setup(&mut pc, &a).unwrap();
    let b: Vec<f64> = (1..=n).map(|i| i as f64).collect();
    let (x, its) = solve_with(&a, &pc, PcSide::Left, &b);
    assert_eq!(its, 1);
    for xi in x {
        assert_abs_diff_eq!(xi, 1.0, epsilon = 1e-12);
    }
}
