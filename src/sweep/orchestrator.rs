use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::config::{BackendSpec, SweepConfig};
use crate::error::{io_error, Result};
use crate::sweep::grid::ParameterPoint;
use crate::sweep::runner::{ExecutionOutcome, ExitState, ExternalRunner, SweepTask};

/// Append-only sweep log.
///
/// The file is opened in append mode for every write and never truncated, so
/// an interrupted sweep leaves a valid prefix behind.
#[derive(Debug, Clone)]
pub struct SweepLog {
    path: PathBuf,
}

impl SweepLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;
        file.write_all(bytes).map_err(|e| io_error(&self.path, e))
    }

    /// Appends captured output, closing its last line if the process left
    /// it open so markers and headers always start a line.
    pub fn append_output(&self, output: &[u8]) -> Result<()> {
        if output.is_empty() {
            return Ok(());
        }
        self.append(output)?;
        if !output.ends_with(b"\n") {
            self.append(b"\n")?;
        }
        Ok(())
    }

    pub fn header(point: ParameterPoint) -> String {
        format!("NC={}, KC={}\n", point.nc, point.kc)
    }
}

/// An invocation that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInvocation {
    pub point: ParameterPoint,
    pub backend: String,
    pub exit: ExitState,
}

#[derive(Debug, Clone)]
pub struct SweepSummary {
    /// Grid points visited.
    pub points: usize,
    /// Invocations made, two per point.
    pub invocations: usize,
    pub failures: Vec<FailedInvocation>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

/// Drives a grid through a runner for one tuned and one reference backend.
///
/// Order is grid-major and backend-minor: for every point the tuned backend
/// runs first, then the reference backend, each exactly once and regardless
/// of the other's exit status.
pub struct SweepOrchestrator<R: ExternalRunner> {
    config: SweepConfig,
    runner: R,
    log: SweepLog,
}

impl<R: ExternalRunner> SweepOrchestrator<R> {
    pub fn new(config: SweepConfig, runner: R) -> Result<Self> {
        config.validate()?;
        let log = SweepLog::new(&config.output);
        Ok(Self {
            config,
            runner,
            log,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn log(&self) -> &SweepLog {
        &self.log
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn task(&self, backend: &BackendSpec, point: ParameterPoint) -> SweepTask {
        SweepTask {
            m: self.config.m,
            n: self.config.n,
            k: self.config.k,
            bench_type: self.config.bench_type.clone(),
            backend: backend.name.clone(),
            params: point,
            timeout: self.config.timeout,
        }
    }

    /// Runs one backend at one point and records its output.
    fn invoke(&self, backend: &BackendSpec, point: ParameterPoint) -> Result<ExecutionOutcome> {
        let task = self.task(backend, point);
        let env = backend.tuning_env(point);

        let outcome = match self.runner.run(&task, &env) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(backend = %backend.name, nc = point.nc, kc = point.kc, "sweep aborted: {err}");
                self.log
                    .append(format!("!! sweep aborted: {err}\n").as_bytes())?;
                return Err(err);
            }
        };

        self.log.append_output(&outcome.output)?;
        if let Some(marker) = outcome.failure_marker() {
            warn!(
                backend = %backend.name,
                nc = point.nc,
                kc = point.kc,
                exit = %outcome.exit,
                "benchmark invocation unsuccessful"
            );
            self.log.append(marker.as_bytes())?;
        }
        Ok(outcome)
    }

    /// Visits every grid point once.
    ///
    /// Unsuccessful exits and launch failures are marked in the log and
    /// collected in the summary. A runner error, such as an expired timeout,
    /// aborts the sweep after an abort line has been logged.
    pub fn run(&self) -> Result<SweepSummary> {
        let started_at = Local::now();
        let total = self.config.grid.len();
        info!(
            points = total,
            m = self.config.m,
            n = self.config.n,
            k = self.config.k,
            bench_type = %self.config.bench_type,
            tuned = %self.config.tuned.name,
            reference = %self.config.reference.name,
            log = %self.log.path().display(),
            "starting sweep"
        );

        let mut points = 0;
        let mut invocations = 0;
        let mut failures = Vec::new();

        for point in &self.config.grid {
            info!(nc = point.nc, kc = point.kc, "grid point {}/{}", points + 1, total);
            self.log.append(SweepLog::header(point).as_bytes())?;

            for backend in [&self.config.tuned, &self.config.reference] {
                let outcome = self.invoke(backend, point)?;
                invocations += 1;
                if !outcome.success() {
                    failures.push(FailedInvocation {
                        point,
                        backend: backend.name.clone(),
                        exit: outcome.exit.clone(),
                    });
                }
            }
            points += 1;
        }

        let finished_at = Local::now();
        info!(
            points,
            invocations,
            failures = failures.len(),
            elapsed_s = (finished_at - started_at).num_seconds(),
            "sweep finished"
        );

        Ok(SweepSummary {
            points,
            invocations,
            failures,
            started_at,
            finished_at,
        })
    }
}
