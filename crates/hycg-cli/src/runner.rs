//! Solve runner: ties together record I/O, the worker group and the solver.
//!
//! Only the coordinating worker (rank 0) touches the file system, measures
//! time and prints. Every other worker receives the problem by broadcast
//! and takes part in the collectives.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use hycg_compute::{
    create_backend, Collective, CollectiveError, ComputeError, SingleProcess, ThreadGroup,
};
use hycg_core::{
    broadcast_problem, validate_dimensions, ConjugateGradient, LinearSolver, Problem, SolveReport,
    SolverError, ValidationError,
};
use hycg_io::{generate_spd, read_record, write_matrix, write_vector, FormatError};

use crate::config::RunSettings;

/// Everything that can end a run, each mapped to a distinct exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to read matrix: {0}")]
    ReadMatrix(#[source] FormatError),

    #[error("Failed to read right hand side: {0}")]
    ReadRhs(#[source] FormatError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to save {what}: {source}")]
    Write {
        what: &'static str,
        #[source]
        source: FormatError,
    },

    #[error(transparent)]
    Config(#[from] anyhow::Error),

    #[error("{0}")]
    Solver(#[from] SolverError),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Worker group error: {0}")]
    Worker(#[from] CollectiveError),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::ReadMatrix(_) => 1,
            RunError::ReadRhs(_) => 2,
            RunError::Validation(ValidationError::NotSquare { .. }) => 3,
            RunError::Validation(ValidationError::SizeMismatch { .. }) => 4,
            RunError::Validation(ValidationError::MultipleColumns { .. }) => 5,
            RunError::Write { .. } => 6,
            RunError::Config(_) => 7,
            RunError::Solver(SolverError::Validation(e)) => {
                RunError::Validation(e.clone()).exit_code()
            }
            RunError::Solver(_) | RunError::Compute(_) | RunError::Worker(_) => 8,
        }
    }

    /// Whether this error only reports that another worker left the group.
    pub fn is_peer_disconnect(&self) -> bool {
        matches!(
            self,
            RunError::Worker(CollectiveError::Disconnected { .. })
                | RunError::Solver(SolverError::Collective(CollectiveError::Disconnected { .. }))
        )
    }
}

/// JSON report written next to the solution on request.
#[derive(Serialize)]
struct RunReport<'a> {
    method: &'a str,
    size: usize,
    workers: usize,
    threads: usize,
    backend: String,
    elapsed_seconds: f64,
    #[serde(flatten)]
    solve: &'a SolveReport,
}

/// Print the usage banner and the effective parameters.
fn print_banner(settings: &RunSettings) {
    println!("Usage: hycg [MATRIX] [RHS] [SOLUTION] [MAX_ITERS] [REL_ERROR]");
    println!("All parameters are optional and have default values");
    println!();
    println!("Command line arguments:");
    println!("  input_file_matrix: {}", settings.matrix.display());
    println!("  input_file_rhs:    {}", settings.rhs.display());
    println!("  output_file_sol:   {}", settings.solution.display());
    println!("  max_iters:         {}", settings.params.max_iterations);
    println!("  rel_error:         {:e}", settings.params.rel_error);
    println!("  workers:           {}", settings.workers);
    println!("  threads/worker:    {}", settings.threads);
    println!();
}

/// Read and validate the problem files.
fn load_problem(matrix_path: &Path, rhs_path: &Path) -> Result<Problem, RunError> {
    println!("Reading matrix from file ...");
    let matrix = read_record(matrix_path).map_err(RunError::ReadMatrix)?;
    println!("Done");
    println!();

    println!("Reading right hand side from file ...");
    let rhs = read_record(rhs_path).map_err(RunError::ReadRhs)?;
    println!("Done");
    println!();

    validate_dimensions(matrix.dims(), rhs.dims())?;
    let matrix = matrix.into_matrix().map_err(RunError::ReadMatrix)?;
    Ok(Problem::new(matrix, rhs.into_vector())?)
}

/// One worker's share of a solve.
///
/// Returns `Ok(None)` on workers that were released because the root
/// failed before the broadcast; the root reports that failure itself.
fn run_worker(
    group: Arc<dyn Collective>,
    settings: &RunSettings,
) -> Result<Option<SolveReport>, RunError> {
    let is_root = group.is_root();

    let root_problem = if is_root {
        match load_problem(&settings.matrix, &settings.rhs) {
            Ok(problem) => Some(problem),
            Err(e) => {
                broadcast_problem(group.as_ref(), None)?;
                return Err(e);
            }
        }
    } else {
        None
    };

    let start = Instant::now();
    let problem = match broadcast_problem(group.as_ref(), root_problem)? {
        Some(problem) => problem,
        None => return Ok(None),
    };

    let backend = create_backend(settings.backend, settings.threads)?;
    let backend_name = backend.device_info().name;
    if is_root {
        log::info!(
            "solving n={} on {} worker(s), backend {}",
            problem.size(),
            group.size(),
            backend_name
        );
    }

    let solver = ConjugateGradient::new(backend, Arc::clone(&group));
    let report = solver.solve(&problem, &settings.params)?;

    if is_root {
        let elapsed = start.elapsed().as_secs_f64();
        println!("{}", report.summary());
        println!("Total CPU time = {}", elapsed);

        println!();
        println!();
        println!("Writing solution to file ...");
        let solution = report.solution.to_vec();
        write_vector(&settings.solution, &solution).map_err(|source| RunError::Write {
            what: "solution",
            source,
        })?;
        println!();
        println!("Done");

        if let Some(path) = &settings.report {
            let run_report = RunReport {
                method: solver.method_name(),
                size: problem.size(),
                workers: group.size(),
                threads: settings.threads,
                backend: backend_name,
                elapsed_seconds: elapsed,
                solve: &report,
            };
            write_report_json(&run_report, path)?;
        }
        println!("Finished successfully");
    }
    Ok(Some(report))
}

fn write_report_json(report: &RunReport<'_>, path: &Path) -> Result<(), RunError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("cannot create {}: {}", parent.display(), e))?;
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)
        .map_err(|e| anyhow::anyhow!("cannot write report {}: {}", path.display(), e))?;
    println!("Report written to: {}", path.display());
    Ok(())
}

/// Run a solve with the resolved settings on the requested worker group.
pub fn run_solve(settings: &RunSettings) -> Result<(), RunError> {
    print_banner(settings);

    if settings.workers == 1 {
        run_worker(Arc::new(SingleProcess), settings)?;
        return Ok(());
    }

    let results = ThreadGroup::run(settings.workers, |member| {
        run_worker(Arc::new(member), settings)
    })?;
    first_failure(results)
}

/// Pick the error that ended a multi-worker run.
///
/// A failing worker disconnects its peers, so their errors only echo the
/// original one; the first error that is not a disconnect wins.
fn first_failure<T>(results: Vec<Result<T, RunError>>) -> Result<(), RunError> {
    let mut echo = None;
    for result in results {
        if let Err(e) = result {
            if !e.is_peer_disconnect() {
                return Err(e);
            }
            echo.get_or_insert(e);
        }
    }
    match echo {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Run a solve as one process of an MPI launch.
#[cfg(feature = "mpi")]
pub fn run_solve_mpi(settings: &RunSettings) -> Result<(), RunError> {
    let (_universe, group) = hycg_compute::MpiGroup::initialize()?;
    if group.is_root() {
        print_banner(settings);
    }
    run_worker(Arc::new(group), settings)?;
    Ok(())
}

/// Load and validate a problem without solving it.
pub fn run_validate(matrix: &Path, rhs: &Path) -> Result<(), RunError> {
    let problem = load_problem(matrix, rhs)?;
    println!("Problem is valid: {} x {} system", problem.size(), problem.size());
    Ok(())
}

/// Write a random SPD problem of the given size.
pub fn run_generate(size: usize, seed: u64, matrix: &Path, rhs: &Path) -> Result<(), RunError> {
    println!("Generating random SPD system of size {} (seed {}) ...", size, seed);
    let (a, b) = generate_spd(size, seed);
    for path in [matrix, rhs] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("cannot create {}: {}", parent.display(), e))?;
        }
    }
    write_matrix(matrix, &a).map_err(|source| RunError::Write {
        what: "matrix",
        source,
    })?;
    write_vector(rhs, &b.to_vec()).map_err(|source| RunError::Write {
        what: "right hand side",
        source,
    })?;
    println!("Matrix written to: {}", matrix.display());
    println!("Right hand side written to: {}", rhs.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hycg_core::SolverParams;
    use ndarray::{array, Array2};
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hycg-runner-{}-{}", std::process::id(), name))
    }

    fn settings(tag: &str, workers: usize) -> RunSettings {
        RunSettings {
            matrix: temp_path(&format!("{}-a.bin", tag)),
            rhs: temp_path(&format!("{}-b.bin", tag)),
            solution: temp_path(&format!("{}-x.bin", tag)),
            report: None,
            params: SolverParams::default(),
            backend: hycg_compute::BackendType::Serial,
            threads: 1,
            workers,
        }
    }

    fn cleanup(s: &RunSettings) {
        for p in [&s.matrix, &s.rhs, &s.solution] {
            std::fs::remove_file(p).ok();
        }
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let open = || FormatError::Truncated { expected: 16, found: 0 };
        let codes = [
            RunError::ReadMatrix(open()).exit_code(),
            RunError::ReadRhs(open()).exit_code(),
            RunError::Validation(ValidationError::NotSquare { rows: 3, cols: 4 }).exit_code(),
            RunError::Validation(ValidationError::SizeMismatch { matrix_rows: 3, rhs_rows: 2 })
                .exit_code(),
            RunError::Validation(ValidationError::MultipleColumns { cols: 2 }).exit_code(),
            RunError::Write { what: "solution", source: open() }.exit_code(),
        ];
        assert_eq!(codes, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_diagonal_solve_writes_solution() {
        let s = settings("diag", 1);
        write_matrix(&s.matrix, &Array2::from_diag(&array![4.0, 9.0, 16.0])).unwrap();
        write_vector(&s.rhs, &[4.0, 9.0, 16.0]).unwrap();

        run_solve(&s).unwrap();
        let solution = read_record(&s.solution).unwrap();
        assert_eq!(solution.dims(), (3, 1));
        for v in solution.data {
            assert!((v - 1.0).abs() < 1e-9);
        }
        cleanup(&s);
    }

    #[test]
    fn test_multi_worker_solve_writes_solution() {
        let s = settings("multi", 3);
        let (a, b) = generate_spd(10, 8);
        write_matrix(&s.matrix, &a).unwrap();
        write_vector(&s.rhs, &b.to_vec()).unwrap();

        run_solve(&s).unwrap();
        let x = read_record(&s.solution).unwrap().into_vector();
        let r = &b - &a.dot(&x);
        assert!(r.dot(&r).sqrt() / b.dot(&b).sqrt() < 1e-8);
        cleanup(&s);
    }

    #[test]
    fn test_non_square_matrix_aborts_every_worker() {
        let s = settings("rect", 2);
        write_matrix(&s.matrix, &Array2::zeros((3, 4))).unwrap();
        write_vector(&s.rhs, &[1.0, 2.0, 3.0]).unwrap();

        let err = run_solve(&s).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(!s.solution.exists());
        cleanup(&s);
    }

    #[test]
    fn test_missing_rhs_reports_code_two() {
        let s = settings("norhs", 1);
        write_matrix(&s.matrix, &Array2::eye(2)).unwrap();
        std::fs::remove_file(&s.rhs).ok();
        let err = run_validate(&s.matrix, &s.rhs).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        cleanup(&s);
    }

    #[test]
    fn test_root_cause_wins_over_disconnects() {
        let results: Vec<Result<(), RunError>> = vec![
            Err(RunError::Solver(SolverError::Collective(
                CollectiveError::Disconnected { rank: 1 },
            ))),
            Err(RunError::Compute(ComputeError::ThreadPool("no threads".into()))),
            Ok(()),
        ];
        let err = first_failure(results).unwrap_err();
        assert!(matches!(err, RunError::Compute(_)));
        assert_eq!(err.exit_code(), 8);

        let only_echo: Vec<Result<(), RunError>> =
            vec![Ok(()), Err(RunError::Worker(CollectiveError::Disconnected { rank: 0 }))];
        assert!(first_failure(only_echo).unwrap_err().is_peer_disconnect());
        assert!(first_failure(vec![Ok::<(), RunError>(())]).is_ok());
    }

    #[test]
    fn test_generate_then_validate() {
        let s = settings("gen", 1);
        run_generate(6, 1, &s.matrix, &s.rhs).unwrap();
        run_validate(&s.matrix, &s.rhs).unwrap();
        cleanup(&s);
    }
}
