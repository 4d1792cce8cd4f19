//! TOML configuration and effective run settings.
//!
//! Settings are layered: built-in defaults, then the optional TOML file,
//! then values given explicitly on the command line.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use hycg_compute::BackendType;
use hycg_core::SolverParams;

use crate::SolveArgs;

/// Top-level configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub solver: SolverParams,
    pub compute: ComputeConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// Execution resources for each run.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComputeConfig {
    /// Compute backend: "auto", "cpu", or "serial". Default: "auto".
    pub backend: String,
    /// Threads per worker; 0 picks a share of the logical cores.
    pub threads: usize,
    /// In-process workers. Default: 1.
    pub workers: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: "auto".into(),
            threads: 0,
            workers: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub matrix: PathBuf,
    pub rhs: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            matrix: PathBuf::from("io/matrix.bin"),
            rhs: PathBuf::from("io/rhs.bin"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Solution file (default: "io/sol.bin").
    pub solution: PathBuf,
    /// Optional JSON solve report.
    pub report: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            solution: PathBuf::from("io/sol.bin"),
            report: None,
        }
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let config: JobConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}

/// Fully resolved settings for a solve.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub matrix: PathBuf,
    pub rhs: PathBuf,
    pub solution: PathBuf,
    pub report: Option<PathBuf>,
    pub params: SolverParams,
    pub backend: BackendType,
    pub threads: usize,
    pub workers: usize,
}

impl RunSettings {
    /// Merge command-line arguments over the config file over defaults.
    pub fn resolve(args: &SolveArgs) -> anyhow::Result<Self> {
        let config = match &args.config {
            Some(path) => load_config(path)?,
            None => JobConfig::default(),
        };

        let mut params = config.solver;
        if let Some(max_iters) = args.max_iters {
            params.max_iterations = max_iters;
        }
        if let Some(rel_error) = args.rel_error {
            params.rel_error = rel_error;
        }
        if args.no_breakdown_check {
            params.detect_breakdown = false;
        }
        if !(params.rel_error.is_finite() && params.rel_error >= 0.0) {
            anyhow::bail!("rel_error must be a non-negative number, got {}", params.rel_error);
        }

        let backend_name = args.backend.as_deref().unwrap_or(&config.compute.backend);
        let backend: BackendType = backend_name.parse()?;

        let workers = args.workers.unwrap_or(config.compute.workers);
        if workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        let threads = match args.threads.unwrap_or(config.compute.threads) {
            0 => default_threads(workers),
            n => n,
        };

        Ok(Self {
            matrix: args.matrix.clone().unwrap_or(config.input.matrix),
            rhs: args.rhs.clone().unwrap_or(config.input.rhs),
            solution: args.solution.clone().unwrap_or(config.output.solution),
            report: args.report.clone().or(config.output.report),
            params,
            backend,
            threads,
            workers,
        })
    }
}

/// Split the logical cores evenly over the in-process workers.
fn default_threads(workers: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / workers).max(1)
}
