use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use kspsolve::config::options::{KspOptions, MatrixOptions, PcOptions, SolverOptions};
use kspsolve::context::{PcSide, PcType};
use kspsolve::driver::{self, RunMode};
use kspsolve::error::KError;
use kspsolve::matrix::MatrixKind;
use kspsolve::parallel::configure_threads;

/// Environment variable whose contents are prepended to the command line.
const OPTIONS_ENV: &str = "KSPSOLVE_OPTIONS";

#[derive(Parser, Debug)]
#[command(
    name = "kspsolve",
    args_override_self = true,
    about = "Solve a sparse test system with restarted GMRES",
    long_about = "Assembles a 1-D Laplacian (or diagonal / random) sparse matrix, solves A x = 1 \
                  with GMRES and a Jacobi, Block Jacobi or no preconditioner, and reports \
                  iterations, residual and timing. PETSc-style single-dash options are accepted."
)]
struct Cli {
    /// Matrix dimension
    #[arg(short = 'n', default_value_t = 1000)]
    n: usize,

    /// Preconditioner
    #[arg(long = "pc_type", value_enum, ignore_case = true, default_value_t = PcType::Jacobi)]
    pc_type: PcType,

    /// Run the size sweep (100, 500, 1000, 2000)
    #[arg(long)]
    test: bool,

    /// Same sweep as -test
    #[arg(long)]
    benchmark: bool,

    /// Relative convergence tolerance
    #[arg(long = "ksp_rtol", default_value_t = 1e-7)]
    ksp_rtol: f64,

    /// Absolute convergence tolerance
    #[arg(long = "ksp_atol", default_value_t = 1e-50)]
    ksp_atol: f64,

    /// Divergence tolerance, relative to the initial residual
    #[arg(long = "ksp_divtol", default_value_t = 1e5)]
    ksp_divtol: f64,

    /// Maximum number of iterations
    #[arg(long = "ksp_max_it", default_value_t = 1000)]
    ksp_max_it: usize,

    /// GMRES restart length
    #[arg(long = "ksp_gmres_restart", default_value_t = 30)]
    ksp_gmres_restart: usize,

    /// Preconditioning side
    #[arg(long = "ksp_pc_side", value_enum, ignore_case = true, default_value_t = PcSide::Left)]
    ksp_pc_side: PcSide,

    /// Print the residual norm at every iteration
    #[arg(long = "ksp_monitor")]
    ksp_monitor: bool,

    /// Use the incoming solution vector as initial guess
    #[arg(long = "ksp_initial_guess_nonzero")]
    ksp_initial_guess_nonzero: bool,

    /// Fail when the solve does not converge
    #[arg(long = "ksp_error_if_not_converged")]
    ksp_error_if_not_converged: bool,

    /// Number of Block Jacobi blocks
    #[arg(long = "pc_bjacobi_blocks", default_value_t = 1)]
    pc_bjacobi_blocks: usize,

    /// Test matrix
    #[arg(long = "mat_type", value_enum, ignore_case = true, default_value_t = MatrixKind::Laplace)]
    mat_type: MatrixKind,

    /// Diagonal value of the diagonal matrix
    #[arg(long = "mat_diagonal", default_value_t = 2.0)]
    mat_diagonal: f64,

    /// Off-diagonal fill probability of the random matrix
    #[arg(long = "mat_density", default_value_t = 0.01)]
    mat_density: f64,

    /// Seed of the random matrix
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print the matrix summary before solving
    #[arg(long = "mat_view_info")]
    mat_view_info: bool,

    /// Worker threads (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.test {
            RunMode::Test
        } else if self.benchmark {
            RunMode::Benchmark
        } else {
            RunMode::Solve
        }
    }

    fn options(&self) -> SolverOptions {
        SolverOptions {
            ksp: KspOptions {
                rtol: self.ksp_rtol,
                atol: self.ksp_atol,
                dtol: self.ksp_divtol,
                max_it: self.ksp_max_it,
                restart: self.ksp_gmres_restart,
                pc_side: self.ksp_pc_side,
                monitor: self.ksp_monitor,
                initial_guess_nonzero: self.ksp_initial_guess_nonzero,
                error_if_not_converged: self.ksp_error_if_not_converged,
            },
            pc: PcOptions { pc_type: self.pc_type, bjacobi_blocks: self.pc_bjacobi_blocks },
            matrix: MatrixOptions {
                kind: self.mat_type,
                n: self.n,
                diagonal: self.mat_diagonal,
                density: self.mat_density,
                seed: self.seed,
                view_info: self.mat_view_info,
            },
            threads: self.threads,
        }
    }
}

/// Prepend `extra` (whitespace separated) after the program name and turn
/// PETSc-style `-pc_type` into `--pc_type`. Single-letter options and
/// negative numbers are left alone.
fn petsc_style_args<I>(args: I, extra: Option<String>) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut out: Vec<OsString> = args.next().into_iter().collect();
    let from_env = extra.iter().flat_map(|s| s.split_whitespace().map(OsString::from)).collect::<Vec<_>>();
    for arg in from_env.into_iter().chain(args) {
        let converted = arg.to_str().and_then(|s| {
            let rest = s.strip_prefix('-')?;
            let long = rest.len() > 1
                && !rest.starts_with('-')
                && rest.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
            long.then(|| OsString::from(format!("-{s}")))
        });
        out.push(converted.unwrap_or(arg));
    }
    out
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let opts = cli.options();
    let threads = configure_threads(opts.threads);
    log::info!("kspsolve: {:?} mode, {} preconditioner, {} threads", cli.mode(), opts.pc.pc_type.label(), threads);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    driver::run(cli.mode(), &opts, &mut out).with_context(|| format!("{:?} run failed", cli.mode()))?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = petsc_style_args(std::env::args_os(), std::env::var(OPTIONS_ENV).ok());
    let cli = Cli::parse_from(args);

    println!("=== GMRES Solver Initialized ===");
    let status = match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e.downcast_ref::<KError>().map(KError::code).unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    };
    println!("=== GMRES Solver Finalized ===");
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<OsString> {
        v.iter().map(OsString::from).collect()
    }

    #[test]
    fn petsc_options_become_long_flags() {
        let out = petsc_style_args(args(&["kspsolve", "-n", "50", "-pc_type", "bjacobi", "-test"]), None);
        assert_eq!(out, args(&["kspsolve", "-n", "50", "--pc_type", "bjacobi", "--test"]));
        let out = petsc_style_args(args(&["kspsolve", "--ksp_rtol", "-1e-3"]), None);
        assert_eq!(out, args(&["kspsolve", "--ksp_rtol", "-1e-3"]));
    }

    #[test]
    fn environment_options_come_first() {
        let out = petsc_style_args(args(&["kspsolve", "-n", "10"]), Some("-ksp_monitor  -pc_type none".into()));
        assert_eq!(out, args(&["kspsolve", "--ksp_monitor", "--pc_type", "none", "-n", "10"]));

        // the command line wins over a repeated environment option
        let out = petsc_style_args(
            args(&["kspsolve", "-pc_type", "bjacobi", "-ksp_monitor"]),
            Some("-pc_type none -ksp_monitor".into()),
        );
        let cli = Cli::try_parse_from(out).unwrap();
        assert_eq!(cli.pc_type, PcType::BJacobi);
        assert!(cli.ksp_monitor);
    }

    #[test]
    fn cli_maps_to_options() {
        let cli = Cli::parse_from(petsc_style_args(
            args(&["kspsolve", "-n", "64", "-pc_type", "BJacobi", "-pc_bjacobi_blocks", "4", "-ksp_pc_side", "right"]),
            None,
        ));
        let opts = cli.options();
        assert_eq!(cli.mode(), RunMode::Solve);
        assert_eq!(opts.matrix.n, 64);
        assert_eq!(opts.pc, PcOptions { pc_type: PcType::BJacobi, bjacobi_blocks: 4 });
        assert_eq!(opts.ksp.pc_side, PcSide::Right);
        assert_eq!(opts.ksp, KspOptions { pc_side: PcSide::Right, ..KspOptions::default() });
    }

    #[test]
    fn defaults_and_modes() {
        let cli = Cli::parse_from(args(&["kspsolve"]));
        assert_eq!(cli.options(), SolverOptions::default());
        let cli = Cli::parse_from(petsc_style_args(args(&["kspsolve", "-benchmark"]), None));
        assert_eq!(cli.mode(), RunMode::Benchmark);
        assert!(Cli::try_parse_from(args(&["kspsolve", "--pc_type", "ilu"])).is_err());
    }
}
