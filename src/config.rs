//! Sweep and report configuration.
//!
//! The command-line front end fills these structs; library callers can build
//! them directly or start from the presets.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{validation_error, Result};
use crate::sweep::grid::{ParameterGrid, ParameterPoint};
use crate::sweep::runner::InvocationEnv;
use crate::{
    DEFAULT_BENCH_TYPE, DEFAULT_DIM, DEFAULT_IMAGES_ROOT, DEFAULT_REFERENCE_BACKEND,
    DEFAULT_RESULTS_ROOT, DEFAULT_SWEEP_LOG, DEFAULT_TUNED_BACKEND, DEFAULT_TUNED_ENV_PREFIX,
};

/// A backend selectable through the benchmark's `--backend` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub name: String,
    /// Prefix of the environment keys carrying blocking parameters.
    /// `None` for the untuned reference backend.
    pub env_prefix: Option<String>,
}

impl BackendSpec {
    pub fn tuned(name: impl Into<String>, env_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env_prefix: Some(env_prefix.into()),
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env_prefix: None,
        }
    }

    /// Environment for one invocation at `point`: `<PREFIX>_NC` and
    /// `<PREFIX>_KC`, or nothing for a reference backend.
    pub fn tuning_env(&self, point: ParameterPoint) -> InvocationEnv {
        let mut env = InvocationEnv::default();
        if let Some(prefix) = &self.env_prefix {
            env.set(format!("{prefix}_NC"), point.nc.to_string());
            env.set(format!("{prefix}_KC"), point.kc.to_string());
        }
        env
    }
}

/// Everything a sweep needs apart from the runner.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub bench_type: String,
    pub tuned: BackendSpec,
    pub reference: BackendSpec,
    pub grid: ParameterGrid,
    /// Append-only log receiving headers and captured output.
    pub output: PathBuf,
    /// Per-invocation limit; expiry aborts the sweep.
    pub timeout: Option<Duration>,
}

impl SweepConfig {
    /// Square `DEFAULT_DIM` sgemm sweep of glare against mkl over the full
    /// candidate grid.
    pub fn comprehensive() -> Self {
        Self {
            m: DEFAULT_DIM,
            n: DEFAULT_DIM,
            k: DEFAULT_DIM,
            bench_type: DEFAULT_BENCH_TYPE.to_string(),
            tuned: BackendSpec::tuned(DEFAULT_TUNED_BACKEND, DEFAULT_TUNED_ENV_PREFIX),
            reference: BackendSpec::reference(DEFAULT_REFERENCE_BACKEND),
            grid: ParameterGrid::comprehensive(),
            output: PathBuf::from(DEFAULT_SWEEP_LOG),
            timeout: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.m == 0 || self.n == 0 || self.k == 0 {
            return Err(validation_error(format!(
                "problem dimensions must be positive, got m={}, n={}, k={}",
                self.m, self.n, self.k
            )));
        }
        if self.bench_type.trim().is_empty() {
            return Err(validation_error("bench type is empty"));
        }
        if self.grid.nc_values().is_empty() {
            return Err(validation_error("nc candidate list is empty"));
        }
        if self.grid.kc_values().is_empty() {
            return Err(validation_error("kc candidate list is empty"));
        }
        match &self.tuned.env_prefix {
            Some(prefix) if !prefix.trim().is_empty() => {}
            _ => {
                return Err(validation_error(format!(
                    "tuned backend `{}` needs an environment prefix",
                    self.tuned.name
                )))
            }
        }
        if self.tuned.name == self.reference.name {
            return Err(validation_error(format!(
                "tuned and reference backend are both `{}`",
                self.tuned.name
            )));
        }
        Ok(())
    }
}

/// Where run folders are read from and charts written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub results_root: PathBuf,
    pub images_root: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            results_root: PathBuf::from(DEFAULT_RESULTS_ROOT),
            images_root: PathBuf::from(DEFAULT_IMAGES_ROOT),
        }
    }
}
