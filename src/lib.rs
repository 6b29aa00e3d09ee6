//! Cache-blocking parameter sweeps and result aggregation for GEMM benchmarks.
//!
//! Two independent pipelines share only the on-disk measurement format:
//!
//! * [`sweep`] walks an NC × KC grid, invoking an external benchmark binary
//!   for a tuned backend and a reference backend at every point and appending
//!   their output to a plain-text log.
//! * [`analysis`] loads measurement records of a run, derives GFLOPS, merges
//!   every implementation into one table and hands per-benchmark comparison
//!   series to a chart renderer.

pub mod analysis;
pub mod config;
pub mod error;
pub mod sweep;

pub use error::{BenchError, Result};

/// NC (columns of B per L3 block) candidates swept by default.
pub const NC_CANDIDATES: [usize; 14] = [
    192, 256, 320, 384, 448, 512, 576, 640, 704, 768, 832, 896, 960, 1024,
];

/// KC (depth per L2 block) candidates swept by default.
pub const KC_CANDIDATES: [usize; 13] = [
    256, 320, 384, 448, 512, 576, 640, 704, 768, 832, 896, 960, 1024,
];

/// Default square problem size of a sweep.
pub const DEFAULT_DIM: usize = 2400;

pub const DEFAULT_BENCH_TYPE: &str = "sgemm";
pub const DEFAULT_TUNED_BACKEND: &str = "glare";
pub const DEFAULT_TUNED_ENV_PREFIX: &str = "GLARE";
pub const DEFAULT_REFERENCE_BACKEND: &str = "mkl";
pub const DEFAULT_SWEEP_LOG: &str = "output.txt";

/// Root directory holding `benchmark_run_<idx>` folders.
pub const DEFAULT_RESULTS_ROOT: &str = "benchmark_results";
/// Root directory receiving rendered charts, one folder per run.
pub const DEFAULT_IMAGES_ROOT: &str = "benchmark_images";
pub const RUN_DIR_PREFIX: &str = "benchmark_run_";
