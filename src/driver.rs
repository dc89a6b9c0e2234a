//! Run modes of the `kspsolve` binary: one solve, or the size sweep.
//!
//! Report lines are written to the supplied writer so they can be captured;
//! diagnostics go through `log`.

use std::io::Write;

use crate::config::options::{MatrixOptions, SolverOptions};
use crate::context::{KspContext, SolverResult, benchmark};
use crate::error::KError;
use crate::matrix::{CsrMatrix, Layout, MatrixKind, diagonal, laplace_1d, matrix_info, random_sparse, rhs_vector};
use crate::parallel::current_threads;
use crate::utils::format::general;

/// Matrix sizes of the `-test` / `-benchmark` sweep.
pub const BENCHMARK_SIZES: [usize; 4] = [100, 500, 1000, 2000];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Assemble, solve once and print the solver information.
    Solve,
    /// `-test`: the size sweep.
    Test,
    /// `-benchmark`: the size sweep.
    Benchmark,
}

/// Ownership ranges used for assembly: one per worker thread, at most one per row.
fn assembly_layout(n: usize) -> Result<Layout, KError> {
    if n == 0 {
        return Err(KError::InvalidArgument("matrix dimension must be positive".into()));
    }
    Layout::split(n, current_threads().clamp(1, n))
}

/// Assemble the test matrix and the all-ones right-hand side.
pub fn assemble(opts: &MatrixOptions) -> Result<(CsrMatrix<f64>, Vec<f64>), KError> {
    let n = opts.n;
    let layout = assembly_layout(n)?;
    let a = match opts.kind {
        MatrixKind::Laplace => laplace_1d(n, &layout)?,
        MatrixKind::Diagonal => diagonal(n, opts.diagonal, &layout)?,
        MatrixKind::Random => random_sparse(n, opts.density, opts.seed, &layout)?,
    };
    let b = rhs_vector(n, &layout)?;
    log::debug!("assembled {} matrix: n = {}, nnz = {}, {} parts", opts.kind.name(), n, a.nnz(), layout.parts());
    Ok((a, b))
}

/// Dispatch on `mode`.
pub fn run<W: Write>(mode: RunMode, opts: &SolverOptions, out: &mut W) -> Result<(), KError> {
    match mode {
        RunMode::Solve => run_single(opts, out).map(|_| ()),
        RunMode::Test => {
            writeln!(out, "Running in test mode...")?;
            run_benchmarks(&BENCHMARK_SIZES, opts, out).map(|_| ())
        }
        RunMode::Benchmark => {
            writeln!(out, "Running benchmarks...")?;
            run_benchmarks(&BENCHMARK_SIZES, opts, out).map(|_| ())
        }
    }
}

/// Assemble the configured matrix, solve once and print the information block.
pub fn run_single<W: Write>(opts: &SolverOptions, out: &mut W) -> Result<SolverResult<f64>, KError> {
    writeln!(out, "Creating {} matrix of size {}...", opts.matrix.kind.name(), opts.matrix.n)?;
    let (a, b) = assemble(&opts.matrix)?;
    if opts.matrix.view_info {
        writeln!(out, "{}", matrix_info(&a, "A"))?;
    }
    let mut x = vec![0.0; a.nrows()];
    let mut ksp = KspContext::new(&a);
    ksp.set_from_options(opts)?;
    ksp.setup()?;
    let result = ksp.solve_with_result(&b, &mut x)?;
    ksp.print_info(out)?;
    Ok(result)
}

/// Solve the Laplace system for every size in `sizes` with the configured
/// preconditioner, one report line per size.
pub fn run_benchmarks<W: Write>(
    sizes: &[usize],
    opts: &SolverOptions,
    out: &mut W,
) -> Result<Vec<SolverResult<f64>>, KError> {
    writeln!(out, "=== Running Benchmarks ===")?;
    let mut results = Vec::with_capacity(sizes.len());
    for &n in sizes {
        let matrix = MatrixOptions { kind: MatrixKind::Laplace, n, ..opts.matrix.clone() };
        let (a, b) = assemble(&matrix)?;
        let mut x = vec![0.0; n];
        let result = benchmark(&a, &b, &mut x, opts.pc.pc_type, opts)?;
        writeln!(
            out,
            "Size: {}, Iterations: {}, Time: {} sec, Residual: {}",
            n,
            result.iterations,
            general(result.solve_time.as_secs_f64()),
            general(result.residual)
        )?;
        log::debug!("size {n}: setup {:.3e} s, {}", result.setup_time.as_secs_f64(), result.reason);
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PcType;

    fn lines(buf: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(buf).lines().map(str::to_owned).collect()
    }

    #[test]
    fn single_run_prints_info_block() {
        let mut opts = SolverOptions::default();
        opts.matrix.n = 40;
        let mut out = Vec::new();
        let result = run_single(&opts, &mut out).unwrap();
        assert!(result.converged);
        let lines = lines(&out);
        assert_eq!(lines[0], "Creating Laplace matrix of size 40...");
        assert_eq!(lines[1], "=== Solver Information ===");
        assert_eq!(lines[2], "Matrix size: 40");
        assert_eq!(lines[3], format!("Iterations: {}", result.iterations));
        assert!(lines[4].starts_with("Final residual: "));
        assert!(lines[5].starts_with("Solve time: ") && lines[5].ends_with(" seconds"));
        assert_eq!(lines[6], "KSP Object:");
    }

    #[test]
    fn matrix_summary_on_request() {
        let mut opts = SolverOptions::default();
        opts.matrix = MatrixOptions { kind: MatrixKind::Diagonal, n: 5, view_info: true, ..MatrixOptions::default() };
        let mut out = Vec::new();
        run_single(&opts, &mut out).unwrap();
        let lines = lines(&out);
        assert_eq!(lines[0], "Creating diagonal matrix of size 5...");
        assert_eq!(lines[1], "Matrix A: 5 x 5, type: csr, nonzeros: 5");
    }

    #[test]
    fn sweep_prints_one_line_per_size() {
        let mut opts = SolverOptions::default();
        opts.pc.pc_type = PcType::BJacobi;
        let mut out = Vec::new();
        let results = run_benchmarks(&[10, 20], &opts, &mut out).unwrap();
        assert_eq!(results.len(), 2);
        let lines = lines(&out);
        assert_eq!(lines[0], "=== Running Benchmarks ===");
        assert!(lines[1].starts_with("Size: 10, Iterations: "));
        assert!(lines[2].starts_with("Size: 20, Iterations: "));
        assert!(lines[2].contains(" sec, Residual: "));
    }

    #[test]
    fn test_mode_announces_itself() {
        let mut out = Vec::new();
        run(RunMode::Test, &SolverOptions::default(), &mut out).unwrap();
        let lines = lines(&out);
        assert_eq!(lines[0], "Running in test mode...");
        assert_eq!(lines[1], "=== Running Benchmarks ===");
        assert_eq!(lines.len(), 2 + BENCHMARK_SIZES.len());
    }

    #[test]
    fn zero_size_is_rejected() {
        let opts = MatrixOptions { n: 0, ..MatrixOptions::default() };
        assert!(matches!(assemble(&opts), Err(KError::InvalidArgument(_))));
    }
}
