//! hycg command-line interface.
//!
//! Solve a dense SPD system stored in binary record files:
//! ```sh
//! hycg io/matrix.bin io/rhs.bin io/sol.bin 1000 1e-9
//! hycg --workers 4 --threads 2 io/matrix.bin io/rhs.bin
//! hycg validate io/matrix.bin io/rhs.bin
//! hycg generate 2000 io/matrix.bin io/rhs.bin --seed 7
//! ```

mod config;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use config::RunSettings;
use runner::RunError;

/// Exit code for malformed arguments or configuration.
const EXIT_USAGE: u8 = 7;

#[derive(Parser)]
#[command(name = "hycg")]
#[command(about = "Hybrid-parallel Conjugate Gradient solver for dense SPD systems")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    solve: SolveArgs,
}

/// Arguments of the default solve action.
#[derive(Args, Debug, Default)]
pub struct SolveArgs {
    /// Input matrix file [default: io/matrix.bin].
    pub matrix: Option<PathBuf>,
    /// Input right-hand-side file [default: io/rhs.bin].
    pub rhs: Option<PathBuf>,
    /// Output solution file [default: io/sol.bin].
    pub solution: Option<PathBuf>,
    /// Maximum number of iterations [default: 1000].
    pub max_iters: Option<usize>,
    /// Target relative residual [default: 1e-9].
    pub rel_error: Option<f64>,

    /// TOML configuration file; command-line values take precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Threads per worker (0 = share of the logical cores).
    #[arg(short, long)]
    pub threads: Option<usize>,
    /// Number of in-process workers.
    #[arg(short, long)]
    pub workers: Option<usize>,
    /// Compute backend: serial, cpu or auto.
    #[arg(short, long)]
    pub backend: Option<String>,
    /// Write a JSON solve report to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Let NaN/zero denominators propagate instead of aborting.
    #[arg(long)]
    pub no_breakdown_check: bool,
    /// Run as one process of an MPI launch (mpiexec -n W hycg --mpi ...).
    #[cfg(feature = "mpi")]
    #[arg(long, conflicts_with = "workers")]
    pub mpi: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a matrix and right-hand side form a valid system.
    Validate {
        /// Input matrix file.
        matrix: PathBuf,
        /// Input right-hand-side file.
        rhs: PathBuf,
    },
    /// Write a random symmetric positive-definite system.
    Generate {
        /// System size n (the matrix is n x n).
        size: usize,
        /// Output matrix file.
        #[arg(default_value = "io/matrix.bin")]
        matrix: PathBuf,
        /// Output right-hand-side file.
        #[arg(default_value = "io/rhs.bin")]
        rhs: PathBuf,
        /// Random seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn run(cli: Cli) -> Result<(), RunError> {
    match cli.command {
        Some(Commands::Validate { matrix, rhs }) => runner::run_validate(&matrix, &rhs),
        Some(Commands::Generate {
            size,
            matrix,
            rhs,
            seed,
        }) => runner::run_generate(size, seed, &matrix, &rhs),
        None => {
            let settings = RunSettings::resolve(&cli.solve)?;
            solve(&cli.solve, &settings)
        }
    }
}

#[cfg(feature = "mpi")]
fn solve(args: &SolveArgs, settings: &RunSettings) -> Result<(), RunError> {
    if args.mpi {
        runner::run_solve_mpi(settings)
    } else {
        runner::run_solve(settings)
    }
}

#[cfg(not(feature = "mpi"))]
fn solve(_args: &SolveArgs, settings: &RunSettings) -> Result<(), RunError> {
    runner::run_solve(settings)
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_solve_arguments() {
        let cli = Cli::try_parse_from(["hycg", "a.bin", "b.bin", "x.bin", "25", "1e-6"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.solve.matrix, Some(PathBuf::from("a.bin")));
        assert_eq!(cli.solve.solution, Some(PathBuf::from("x.bin")));
        assert_eq!(cli.solve.max_iters, Some(25));
        assert_eq!(cli.solve.rel_error, Some(1e-6));
    }

    #[test]
    fn test_no_arguments_uses_defaults() {
        let cli = Cli::try_parse_from(["hycg"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.solve.matrix.is_none());
        let settings = RunSettings::resolve(&cli.solve).unwrap();
        assert_eq!(settings.params.max_iterations, 1000);
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::try_parse_from(["hycg", "generate", "100", "--seed", "3"]).unwrap();
        match cli.command {
            Some(Commands::Generate { size, seed, matrix, .. }) => {
                assert_eq!((size, seed), (100, 3));
                assert_eq!(matrix, PathBuf::from("io/matrix.bin"));
            }
            _ => panic!("expected generate"),
        }
        let cli = Cli::try_parse_from(["hycg", "validate", "a.bin", "b.bin"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Validate { .. })));
    }

    #[test]
    fn test_bad_iteration_count_is_usage_error() {
        let err = Cli::try_parse_from(["hycg", "a.bin", "b.bin", "x.bin", "many"])
            .err()
            .unwrap();
        assert!(err.use_stderr());
    }
}
